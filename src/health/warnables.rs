//! Built-in warnable definitions for the agent.
//!
//! The relay warnables all depend on `network-status`: when the whole
//! network is down there is no point telling the operator about every
//! relay symptom that implies.

use std::sync::Arc;

use anyhow::Context;

use super::args::ArgKey;
use super::catalog::{CatalogBuilder, CatalogError, Severity, Text, Warnable, WarnableHandle};
use super::tracker::HealthTracker;

/// Handles for the built-in warnables, wired into producers by dependency
/// injection.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinWarnables {
    /// An update is available.
    pub update_available: WarnableHandle,
    /// An urgent security update is available.
    pub security_update_available: WarnableHandle,
    /// Running an unstable development build.
    pub unstable_version: WarnableHandle,
    /// No network interface is up.
    pub network_status: WarnableHandle,
    /// The agent is administratively stopped.
    pub not_running: WarnableHandle,
    /// The local log is misconfigured.
    pub local_log_config: WarnableHandle,
    /// The user is logged out.
    pub login_state: WarnableHandle,
    /// Not in a sync poll with the coordination server.
    pub not_in_sync_poll: WarnableHandle,
    /// No home relay server could be reached.
    pub no_relay_home: WarnableHandle,
    /// A specific relay server is unreachable.
    pub no_relay_connection: WarnableHandle,
    /// The home relay region has gone quiet.
    pub relay_timed_out: WarnableHandle,
    /// A relay region is reporting an issue.
    pub relay_region_error: WarnableHandle,
    /// Could not bind the UDP listen socket.
    pub no_udp_bind: WarnableHandle,
    /// No network map received from the coordination server in a while.
    pub sync_response_timeout: WarnableHandle,
    /// TLS to a server failed.
    pub tls_connection_failed: WarnableHandle,
    /// An internal receive function stopped running.
    pub receive_func_stopped: WarnableHandle,
    /// The configuration stored on disk could not be applied.
    pub apply_disk_config: WarnableHandle,
    /// The coordination server is reporting a health issue.
    pub control_health: WarnableHandle,
}

/// Code of the root-cause warnable the relay symptoms depend on.
const NETWORK_STATUS: &str = "network-status";

/// Register the built-in warnables into `builder`.
///
/// # Errors
///
/// Returns a [`CatalogError`] if the builder already contains one of the
/// built-in codes.
pub fn register_builtins(builder: &mut CatalogBuilder) -> Result<BuiltinWarnables, CatalogError> {
    let update_available = builder.register(Warnable {
        code: "update-available",
        title: "Update available",
        severity: Severity::Low,
        text: Text::Templated(|args| {
            format!(
                "An update from version {} to {} is available. Restart the agent after installing to apply it.",
                args.get(ArgKey::CurrentVersion),
                args.get(ArgKey::AvailableVersion)
            )
        }),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let security_update_available = builder.register(Warnable {
        code: "security-update-available",
        title: "Security update available",
        severity: Severity::High,
        text: Text::Templated(|args| {
            format!(
                "An urgent security update from version {} to {} is available. Install it now.",
                args.get(ArgKey::CurrentVersion),
                args.get(ArgKey::AvailableVersion)
            )
        }),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let unstable_version = builder.register(Warnable {
        code: "is-using-unstable-version",
        title: "Using an unstable version",
        severity: Severity::Low,
        text: Text::Static(
            "This is an unstable build of the agent meant for testing and development. Please report any bugs you hit.",
        ),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let network_status = builder.register(Warnable {
        code: NETWORK_STATUS,
        title: "Network down",
        severity: Severity::High,
        text: Text::Static(
            "The agent cannot connect because the network is down. (No network interface is up.)",
        ),
        depends_on: &[],
        impacts_connectivity: true,
    })?;

    let not_running = builder.register(Warnable {
        code: "wantrunning-false",
        title: "Agent stopped",
        severity: Severity::Low,
        text: Text::Static("The agent is stopped."),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let local_log_config = builder.register(Warnable {
        code: "local-log-config-error",
        title: "Local log misconfiguration",
        severity: Severity::Low,
        text: Text::Templated(|args| {
            format!("The local log is misconfigured: {}", args.get(ArgKey::ErrorText))
        }),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let login_state = builder.register(Warnable {
        code: "login-state",
        title: "Logged out",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            let error = args.get(ArgKey::ErrorText);
            if error.is_empty() {
                "You are logged out.".to_owned()
            } else {
                format!("You are logged out. The last login error was: {error}")
            }
        }),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let not_in_sync_poll = builder.register(Warnable {
        code: "not-in-sync-poll",
        title: "Cannot reach coordination server",
        severity: Severity::Medium,
        text: Text::Static(
            "Cannot reach the coordination server (not in a sync poll). Check your Internet connection.",
        ),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: false,
    })?;

    let no_relay_home = builder.register(Warnable {
        code: "no-relay-home",
        title: "No home relay server",
        severity: Severity::High,
        text: Text::Static(
            "The agent could not connect to any relay server. Check your Internet connection.",
        ),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: false,
    })?;

    let no_relay_connection = builder.register(Warnable {
        code: "no-relay-connection",
        title: "Relay server unavailable",
        severity: Severity::High,
        text: Text::Templated(|args| {
            let name = args.get(ArgKey::RelayRegionName);
            if name.is_empty() {
                format!(
                    "The agent could not connect to the relay server with ID '{}'. Your Internet connection might be down, or the server might be temporarily unavailable.",
                    args.get(ArgKey::RelayRegionId)
                )
            } else {
                format!(
                    "The agent could not connect to the '{name}' relay server. Your Internet connection might be down, or the server might be temporarily unavailable."
                )
            }
        }),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: false,
    })?;

    let relay_timed_out = builder.register(Warnable {
        code: "relay-timed-out",
        title: "Relay server timed out",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            let name = args.get(ArgKey::RelayRegionName);
            if name.is_empty() {
                format!(
                    "Nothing heard from the home relay server (region ID '{}') in {}. The server might be temporarily unavailable, or your Internet connection might be down.",
                    args.get(ArgKey::RelayRegionId),
                    args.get(ArgKey::Duration)
                )
            } else {
                format!(
                    "Nothing heard from the '{name}' relay server in {}. The server might be temporarily unavailable, or your Internet connection might be down.",
                    args.get(ArgKey::Duration)
                )
            }
        }),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: false,
    })?;

    let relay_region_error = builder.register(Warnable {
        code: "relay-region-error",
        title: "Relay server error",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            format!(
                "The relay server #{} is reporting an issue: {}",
                args.get(ArgKey::RelayRegionId),
                args.get(ArgKey::ErrorText)
            )
        }),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: false,
    })?;

    let no_udp_bind = builder.register(Warnable {
        code: "no-udp-bind",
        title: "Incoming connections may fail",
        severity: Severity::High,
        text: Text::Static("The agent couldn't listen for incoming UDP connections."),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: true,
    })?;

    let sync_response_timeout = builder.register(Warnable {
        code: "sync-response-timeout",
        title: "Network map response timeout",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            format!(
                "No network map received from the coordination server in {}.",
                args.get(ArgKey::Duration)
            )
        }),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: false,
    })?;

    let tls_connection_failed = builder.register(Warnable {
        code: "tls-connection-failed",
        title: "Encrypted connection failed",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            format!(
                "Could not establish an encrypted connection with '{}': {}",
                args.get(ArgKey::ServerName),
                args.get(ArgKey::ErrorText)
            )
        }),
        depends_on: &[NETWORK_STATUS],
        impacts_connectivity: false,
    })?;

    let receive_func_stopped = builder.register(Warnable {
        code: "receive-func-error",
        title: "Receive function not running",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            format!(
                "The receive function {} is not running. You might experience connectivity issues.",
                args.get(ArgKey::FunctionName)
            )
        }),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let apply_disk_config = builder.register(Warnable {
        code: "apply-disk-config",
        title: "Could not apply configuration",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            format!(
                "An error occurred applying the configuration stored on disk: {}",
                args.get(ArgKey::ErrorText)
            )
        }),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    let control_health = builder.register(Warnable {
        code: "control-health",
        title: "Coordination server reports an issue",
        severity: Severity::Medium,
        text: Text::Templated(|args| {
            format!(
                "The coordination server is reporting a health issue: {}",
                args.get(ArgKey::ErrorText)
            )
        }),
        depends_on: &[],
        impacts_connectivity: false,
    })?;

    Ok(BuiltinWarnables {
        update_available,
        security_update_available,
        unstable_version,
        network_status,
        not_running,
        local_log_config,
        login_state,
        not_in_sync_poll,
        no_relay_home,
        no_relay_connection,
        relay_timed_out,
        relay_region_error,
        no_udp_bind,
        sync_response_timeout,
        tls_connection_failed,
        receive_func_stopped,
        apply_disk_config,
        control_health,
    })
}

/// Build a tracker over the built-in catalog in one call.
///
/// # Errors
///
/// Returns an error if catalog construction fails, which for the built-in
/// set would indicate a bug in this module.
pub fn builtin_tracker() -> anyhow::Result<(HealthTracker, BuiltinWarnables)> {
    let mut builder = CatalogBuilder::new();
    let handles =
        register_builtins(&mut builder).context("failed to register built-in warnables")?;
    let catalog = builder.freeze().context("failed to freeze health catalog")?;
    Ok((HealthTracker::new(Arc::new(catalog)), handles))
}
