//! Process-wide session registry
//!
//! The registry is the single owner of the queue manager and the audio
//! pipeline. Components receive it by `Arc` instead of reaching for
//! globals, and its lifecycle is explicit: [`Registry::init`] builds and
//! wires everything, [`Registry::destroy`] stops the loops, force-flushes
//! inbound state and releases audio contexts.
//!
//! While initialised, the registry owns the manager's receive handler:
//! audio is routed into playback, turn-control messages are inspected for
//! interruptions, and every message is then offered to the application
//! consumer installed with [`Registry::set_consumer`].

use crate::audio::api::{AudioConfig, AudioPipeline};
use crate::core::error_handling::{log_absorbed, ContextualError};
use crate::queue::api::{
    ConsumerError, HandlerId, HandlerSlot, ManagerConfig, MessageQueueManager, Payload,
    ProcessingMessage, TrafficClass,
};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Application-level consumer of inbound traffic
pub type Consumer =
    dyn Fn(TrafficClass, &ProcessingMessage) -> Result<Option<Payload>, ConsumerError> + Send + Sync;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry is already initialised")]
    AlreadyInitialised,

    #[error("Registry is not initialised")]
    NotInitialised,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ContextualError for RegistryError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, RegistryError::InvalidConfig(_))
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            RegistryError::InvalidConfig(message) => Some(message),
            _ => None,
        }
    }
}

struct Session {
    manager: Arc<MessageQueueManager>,
    audio: Arc<AudioPipeline>,
}

pub struct Registry {
    session: Mutex<Option<Session>>,
    consumer: Arc<HandlerSlot<Consumer>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            consumer: Arc::new(HandlerSlot::new("consumer")),
        }
    }

    /// Build the manager and audio pipeline and wire inbound routing
    pub fn init(&self, manager_config: ManagerConfig, audio_config: AudioConfig) -> Result<(), RegistryError> {
        manager_config.validate().map_err(RegistryError::InvalidConfig)?;
        audio_config.validate().map_err(RegistryError::InvalidConfig)?;

        let mut session = self.session.lock().unwrap();
        if session.is_some() {
            return Err(RegistryError::AlreadyInitialised);
        }

        let manager = Arc::new(MessageQueueManager::new(manager_config));
        let audio = Arc::new(AudioPipeline::new(audio_config, manager.notifications()));

        let route_audio = Arc::clone(&audio);
        let consumer = Arc::clone(&self.consumer);
        manager.set_receive_handler(move |class, message| {
            match class {
                TrafficClass::Audio => {
                    if let Err(err) = route_audio.handle_inbound(&message.payload, Instant::now()) {
                        log_absorbed(&err, "Dropping inbound audio");
                        return Err(ConsumerError::new(err.to_string()));
                    }
                }
                TrafficClass::Control => {
                    if let Payload::Json(value) = &message.payload {
                        route_audio.handle_turn_control(value);
                    }
                }
                TrafficClass::Text | TrafficClass::Video => {}
            }
            match consumer.get() {
                Some(handler) => handler(class, message),
                None => Ok(None),
            }
        });

        *session = Some(Session { manager, audio });
        log::debug!("Registry initialised");
        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }

    pub fn manager(&self) -> Result<Arc<MessageQueueManager>, RegistryError> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|session| Arc::clone(&session.manager))
            .ok_or(RegistryError::NotInitialised)
    }

    pub fn audio(&self) -> Result<Arc<AudioPipeline>, RegistryError> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|session| Arc::clone(&session.audio))
            .ok_or(RegistryError::NotInitialised)
    }

    /// Install the consumer that sees every inbound message after audio routing
    pub fn set_consumer<F>(&self, consumer: F) -> HandlerId
    where
        F: Fn(TrafficClass, &ProcessingMessage) -> Result<Option<Payload>, ConsumerError>
            + Send
            + Sync
            + 'static,
    {
        let consumer: Arc<Consumer> = Arc::new(consumer);
        self.consumer.set(consumer)
    }

    pub fn clear_consumer(&self, id: HandlerId) -> bool {
        self.consumer.clear(id)
    }

    /// Tear everything down; returns false when there was nothing to destroy
    pub async fn destroy(&self) -> bool {
        let session = self.session.lock().unwrap().take();
        let Some(session) = session else {
            return false;
        };

        session.manager.destroy().await;
        let closed = session.audio.close();
        self.consumer.reset();
        log::info!("Registry destroyed ({} audio context(s) released)", closed);
        true
    }
}
