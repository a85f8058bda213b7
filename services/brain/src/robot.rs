use crate::channel::Transport;
use std::time::Duration;
use tracing::{info, warn};
use tutor_core::envelope::{Command, Response};

/// High-level robot verbs on top of a [`Transport`].
pub struct RobotProxy<T: Transport> {
    transport: T,
}

impl<T: Transport> RobotProxy<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn ping(&mut self) -> bool {
        self.transport.ping().await
    }

    pub async fn say(&mut self, text: &str) -> Response {
        info!("Sending SAY command: '{}'", text);
        self.transport.send(Command::say(text)).await
    }

    pub async fn play_animation(&mut self, name: &str) -> Response {
        info!("Sending ANIMATE command: '{}'", name);
        self.transport.send(Command::play_animation(name)).await
    }

    pub async fn show_image(&mut self, url: &str) -> Response {
        info!("Sending TABLET command: '{}'", url);
        self.transport.send(Command::show_image(url)).await
    }

    /// Listens for one word of `vocabulary`. Returns "" on silence or any failure.
    pub async fn listen(&mut self, vocabulary: &[String], timeout: Duration) -> String {
        info!(vocabulary = ?vocabulary, timeout = ?timeout, "Sending LISTEN command");
        let response = self.transport.send(Command::listen(vocabulary, timeout)).await;
        let word = response.heard().to_string();
        if word.is_empty() {
            warn!("Listener timed out or heard nothing.");
        } else {
            info!("Listener heard: '{}'", word);
        }
        word
    }

    pub async fn rest(&mut self) -> Response {
        info!("Sending REST command.");
        self.transport.send(Command::rest()).await
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
