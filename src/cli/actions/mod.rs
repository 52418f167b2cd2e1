pub mod server;

/// Actions produced by the CLI dispatcher.
#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}
