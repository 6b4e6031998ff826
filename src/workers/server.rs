//! SERVER worker: accepts one inbound peer at a time on `[network.server]`.

use crate::config::Settings;
use crate::connection::{ConnectionSupervisor, NetDialer, Role, StreamComms, SupervisorParams};
use crate::core::{PollingSleeper, WorkerContext};
use crate::threads::Worker;
use crate::workers::client::LinkSupervisor;

/// Listens on `[network.server]` and supervises each accepted session.
pub struct ServerWorker {
    supervisor: LinkSupervisor,
}

impl ServerWorker {
    /// Builds the worker from `[network.server]` and `[runtime]`.
    pub fn new(settings: &Settings) -> Self {
        let link = &settings.network.server;
        let dialer = NetDialer::new(Role::Server, settings.network.server_endpoint());
        let comms = StreamComms::new(Role::Server, link, false);
        Self {
            supervisor: ConnectionSupervisor::new(
                dialer,
                comms,
                PollingSleeper::default(),
                SupervisorParams::from_settings(link, &settings.runtime),
            ),
        }
    }

    /// The underlying supervisor.
    pub fn supervisor(&self) -> &LinkSupervisor {
        &self.supervisor
    }
}

impl Worker for ServerWorker {
    fn run(&self, ctx: &WorkerContext) {
        self.supervisor.run(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Dialer;

    #[test]
    fn test_defaults_listen_on_all_interfaces() {
        let worker = ServerWorker::new(&Settings::default());
        assert_eq!(worker.supervisor().dialer().target(), "tcp://0.0.0.0:4150");
    }

    #[test]
    fn test_udp_server_needs_no_accept() {
        let mut settings = Settings::default();
        settings.network.server.is_tcp = false;
        let worker = ServerWorker::new(&settings);
        assert!(!worker.supervisor().dialer().is_stream());
    }
}
