//! CLIENT worker: keeps the outbound link to the configured server alive.

use crate::config::Settings;
use crate::connection::{ConnectionSupervisor, NetDialer, Role, StreamComms, SupervisorParams};
use crate::core::{PollingSleeper, WorkerContext};
use crate::threads::Worker;

/// Supervisor type used by the CLIENT and SERVER workers.
pub type LinkSupervisor = ConnectionSupervisor<NetDialer, StreamComms, PollingSleeper>;

/// Dials `[network.client]` and supervises its sessions.
pub struct ClientWorker {
    supervisor: LinkSupervisor,
}

impl ClientWorker {
    /// Builds the worker from `[network.client]`, `[debug]` and `[runtime]`.
    pub fn new(settings: &Settings) -> Self {
        let link = &settings.network.client;
        let dialer = NetDialer::new(Role::Client, settings.network.client_endpoint());
        let comms = StreamComms::new(
            Role::Client,
            link,
            settings.debug.suppress_client_send_data,
        );
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

impl Worker for ClientWorker {
    fn run(&self, ctx: &WorkerContext) {
        self.supervisor.run(ctx);
    }
}
