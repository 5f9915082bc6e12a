// Playback thread - drives the sequencer from a coarse timer
//
// The thread owns the sequencer and the trigger sink. Each wake it drains the
// command queue, polls the lookahead scheduler against the audio clock, then
// sleeps `timer_interval_ms`. Timing accuracy comes from the scheduled tick
// times, not from the wake times.

use crate::audio::clock::AudioClock;
use crate::audio::trigger::TriggerSink;
use crate::error::PlaybackError;
use crate::messaging::channels::{
    CommandConsumer, CommandProducer, DEFAULT_CHANNEL_CAPACITY, NotificationConsumer,
    NotificationProducer, create_command_channel, create_notification_channel,
};
use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use crate::sequencer::engine::Sequencer;
use crate::sequencer::transport::SharedTransportState;
use log::{debug, info, trace};
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Handle to a running playback thread
///
/// Dropping the handle shuts the thread down and discards the sequencer; use
/// [`PlaybackThread::shutdown`] to get it back.
pub struct PlaybackThread<S> {
    commands: CommandProducer,
    notifications: NotificationConsumer,
    transport: Arc<SharedTransportState>,
    handle: Option<thread::JoinHandle<(Sequencer, S)>>,
}

impl<S: TriggerSink + Send + 'static> PlaybackThread<S> {
    pub fn spawn<C>(sequencer: Sequencer, clock: C, sink: S) -> Result<Self, PlaybackError>
    where
        C: AudioClock + Send + 'static,
    {
        let (commands, command_rx) = create_command_channel(DEFAULT_CHANNEL_CAPACITY);
        let (notification_tx, notifications) =
            create_notification_channel(DEFAULT_CHANNEL_CAPACITY);
        let transport = sequencer.transport();

        let handle = thread::Builder::new()
            .name("sequencer-playback".to_string())
            .spawn(move || run(sequencer, clock, sink, command_rx, notification_tx))?;

        Ok(Self {
            commands,
            notifications,
            transport,
            handle: Some(handle),
        })
    }

    /// Stop playback, end the thread and hand back the sequencer and sink
    pub fn shutdown(mut self) -> Result<(Sequencer, S), PlaybackError> {
        self.request_shutdown();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| PlaybackError::Panicked),
            None => Err(PlaybackError::Panicked),
        }
    }
}

impl<S> PlaybackThread<S> {
    /// Queue a command; never blocks
    pub fn send(&mut self, command: Command) -> Result<(), PlaybackError> {
        self.commands
            .try_push(command)
            .map_err(|_| PlaybackError::QueueFull)
    }

    pub fn start(&mut self, bpm: f64) -> Result<(), PlaybackError> {
        self.send(Command::Start { bpm })
    }

    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        self.send(Command::Stop)
    }

    pub fn try_recv(&mut self) -> Option<Notification> {
        self.notifications.try_pop()
    }

    /// Every notification queued so far
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Some(notification) = self.notifications.try_pop() {
            drained.push(notification);
        }
        drained
    }

    pub fn transport(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.transport)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn request_shutdown(&mut self) {
        while self.commands.try_push(Command::Shutdown).is_err() {
            if !self.is_running() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl<S> Drop for PlaybackThread<S> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_shutdown();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn notify(queue: &mut NotificationProducer, notification: Notification) {
    if queue.try_push(notification).is_err() {
        trace!("Notification queue full, dropped {:?}", notification);
    }
}

/// Apply one command; false once the thread should exit
fn apply<C: AudioClock>(
    sequencer: &mut Sequencer,
    clock: &C,
    command: Command,
    notifications: &mut NotificationProducer,
) -> bool {
    match command {
        Command::Start { bpm } => {
            if sequencer.start(bpm, clock.now()) {
                notify(
                    notifications,
                    Notification::Started {
                        bpm: sequencer.scheduler().tempo().bpm(),
                    },
                );
            }
        }
        Command::Stop => {
            if sequencer.stop() {
                notify(notifications, Notification::Stopped);
            }
        }
        Command::GotoChainSlot(index) => {
            sequencer.goto_chain_slot(index);
            notify(
                notifications,
                Notification::ChainAdvanced {
                    pos: sequencer.song().chain.pos,
                },
            );
        }
        Command::SetFollowChain(follow) => sequencer.set_follow_chain(follow),
        Command::SetLoopChain(looping) => sequencer.set_loop_chain(looping),
        Command::Shutdown => {
            if sequencer.stop() {
                notify(notifications, Notification::Stopped);
            }
            return false;
        }
    }
    true
}

fn run<C: AudioClock, S: TriggerSink>(
    mut sequencer: Sequencer,
    clock: C,
    mut sink: S,
    mut commands: CommandConsumer,
    mut notifications: NotificationProducer,
) -> (Sequencer, S) {
    let interval = Duration::from_millis(sequencer.config().timer_interval_ms);
    info!("Playback thread running, waking every {:?}", interval);

    loop {
        while let Some(command) = commands.try_pop() {
            debug!("Playback command {:?}", command);
            if !apply(&mut sequencer, &clock, command, &mut notifications) {
                info!("Playback thread shutting down");
                return (sequencer, sink);
            }
        }

        for report in sequencer.poll(clock.now(), &mut sink) {
            notify(
                &mut notifications,
                Notification::Tick {
                    step_index: report.step_index,
                    time: report.time,
                    hits: report.hits,
                },
            );
            if let Some(pos) = report.chain_pos {
                notify(&mut notifications, Notification::ChainAdvanced { pos });
            }
        }

        thread::sleep(interval);
    }
}
