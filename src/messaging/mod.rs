// Module messaging - lock-free queues to and from the playback thread

pub mod channels;
pub mod command;
pub mod notification;

pub use channels::{
    CommandConsumer, CommandProducer, DEFAULT_CHANNEL_CAPACITY, NotificationConsumer,
    NotificationProducer, create_command_channel, create_notification_channel,
};
pub use command::Command;
pub use notification::{Notification, NotificationLevel};
