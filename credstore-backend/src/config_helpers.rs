use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use credstore_db::{DbConnectionConfig, DbConnectionError};

/// Env prefix for connection settings that bypass the config file.
const DB_ENV_PREFIX: &str = "CREDSTORE";

/// Build database connection config from application config.
///
/// `CREDSTORE_DATABASE_URL` (with the `CREDSTORE_DB_*` pool knobs) takes
/// precedence over the `[database]` section.
pub fn database_config_from_config(
    cfg: &credstore_config::Config,
) -> Result<DbConnectionConfig, DbConnectionError> {
    if std::env::var_os(format!("{DB_ENV_PREFIX}_DATABASE_URL")).is_some() {
        return DbConnectionConfig::from_env(DB_ENV_PREFIX);
    }
    let mut db_cfg = DbConnectionConfig::from_path(&cfg.database.path);
    db_cfg.max_connections = cfg.database.max_connections;
    db_cfg.min_connections = db_cfg.min_connections.min(db_cfg.max_connections);
    db_cfg.connect_timeout_secs = cfg.database.connect_timeout_secs;
    db_cfg.validate()?;
    Ok(db_cfg)
}

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| {
            host.trim_matches(|c| c == '[' || c == ']')
                .parse::<Ipv6Addr>()
                .map(|ip| SocketAddr::new(IpAddr::V6(ip), port))
        })
        .unwrap_or_else(|_| {
            tracing::warn!(%host, "host is not an IP address; binding to 0.0.0.0");
            SocketAddr::from(([0, 0, 0, 0], port))
        })
}
