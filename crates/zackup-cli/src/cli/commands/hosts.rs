//! `zackup hosts` – list configured hosts.

use zackup_core::config::ZackupConfig;

pub fn run_hosts(cfg: &ZackupConfig) {
    if cfg.hosts.is_empty() {
        println!("no hosts configured");
        return;
    }
    for host in &cfg.hosts {
        println!("{:<32} {}", host.name, cfg.command_for(host));
    }
}
