use crate::models::Game;

/// Outbound notification effect, implemented by the chat front end.
///
/// Fire-and-forget: implementations must not fail the originating engine
/// operation, so the trait offers no error channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, game: &Game, message: &str);
}

/// Default notifier that writes announcements to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, game: &Game, message: &str) {
        log::info!("[game {}] {}", game.id, message);
    }
}
