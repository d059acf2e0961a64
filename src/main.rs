//! CLI entry point: load config, wire up the cache and server, install
//! signal handlers, and run until shutdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;

use aredn_ldap_bridge::cache::LazyCache;
use aredn_ldap_bridge::config::{self, Config};
use aredn_ldap_bridge::logging;
use aredn_ldap_bridge::server::Server;
use aredn_ldap_bridge::upstream::UpstreamClient;

#[derive(Parser, Debug)]
#[command(name = "aredn-ldap-bridge", about = "LDAPv3 front end for an AREDN mesh phone book")]
struct Opts {
    /// Path to an INI config file. Falls back to built-in defaults if
    /// omitted or unreadable.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn build_upstream(config: &Config) -> UpstreamClient {
    UpstreamClient::new(
        config.upstream_nodes.clone(),
        config.upstream_timeout(),
        config.protocol_filter.clone(),
    )
}

fn main() {
    let opts = Opts::parse();
    let config = config::load_config(opts.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("failed to load config, using defaults: {e}");
        Config::default()
    });

    logging::init(&config.log_level);
    log::info!(
        "starting on {}:{} (base_dn={}, upstream_nodes={:?}, ttl={}s, max_results={})",
        config.listen_address,
        config.listen_port,
        config.base_dn,
        config.upstream_nodes,
        config.cache_ttl_seconds,
        config.max_results,
    );

    let cache = Arc::new(LazyCache::new(
        build_upstream(&config),
        config.base_dn.clone(),
        config.cache_ttl_seconds,
    ));
    let config_handle = Arc::new(Mutex::new(Arc::new(config)));

    let server = Server::bind(Arc::clone(&cache), Arc::clone(&config_handle))
        .unwrap_or_else(|e| {
            log::error!("failed to bind listening socket: {e}");
            std::process::exit(1);
        });
    log::info!("listening on {:?}", server.local_addr());

    install_signal_handlers(Arc::clone(&cache), Arc::clone(&config_handle));

    server.serve_forever();
}

/// SIGTERM/SIGINT set a flag this thread polls and exits the process on;
/// SIGHUP triggers a config reload in place. Connection threads are daemon
/// style and are never joined, matching the shutdown semantics in use here.
fn install_signal_handlers(cache: Arc<LazyCache>, config_handle: Arc<Mutex<Arc<Config>>>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let reload = Arc::new(AtomicBool::new(false));

    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown)) {
        log::warn!("failed to register SIGTERM handler: {e}");
    }
    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown)) {
        log::warn!("failed to register SIGINT handler: {e}");
    }
    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGHUP, Arc::clone(&reload)) {
        log::warn!("failed to register SIGHUP handler: {e}");
    }

    thread::spawn(move || loop {
        if shutdown.load(Ordering::Relaxed) {
            log::info!("shutdown signal received, exiting");
            std::process::exit(0);
        }
        if reload.swap(false, Ordering::Relaxed) {
            reload_config(&cache, &config_handle);
        }
        thread::sleep(Duration::from_millis(200));
    });
}

fn reload_config(cache: &LazyCache, config_handle: &Mutex<Arc<Config>>) {
    let source_path = config_handle.lock().unwrap().source_path.clone();
    let new_config = match config::load_config(source_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("SIGHUP reload failed, keeping current config: {e}");
            return;
        }
    };

    {
        let current = config_handle.lock().unwrap();
        if new_config.listen_address != current.listen_address
            || new_config.listen_port != current.listen_port
        {
            log::warn!("listen_address/listen_port changed in reloaded config; restart required to apply");
        }
    }

    logging::set_level(&new_config.log_level);
    cache.reload_settings(
        build_upstream(&new_config),
        new_config.base_dn.clone(),
        new_config.cache_ttl_seconds,
    );
    log::info!(
        "config reloaded (base_dn={}, max_results={}, ttl={}s)",
        new_config.base_dn,
        new_config.max_results,
        new_config.cache_ttl_seconds,
    );
    *config_handle.lock().unwrap() = Arc::new(new_config);
}
