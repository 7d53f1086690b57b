use anyhow::Result;

use crate::LinkConfig;

pub fn check_link(cfg: &LinkConfig) -> Result<()> {
    let has_url = cfg.connect.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(false);
    anyhow::ensure!(has_url || cfg.autodetect, "link.connect missing and link.autodetect=false");
    anyhow::ensure!(cfg.sys_id > 0, "link.sys_id must be non-zero");
    anyhow::ensure!(cfg.target_sys > 0, "link.target_sys must be non-zero");
    anyhow::ensure!(
        (100..=10_000).contains(&cfg.command_timeout_ms),
        "link.command_timeout_ms should be 100..10000"
    );
    if let Some(hz) = cfg.send_heartbeat_hz {
        anyhow::ensure!(hz > 0.0 && hz <= 10.0, "link.send_heartbeat_hz should be in (0, 10]");
    }
    if let Some(bauds) = &cfg.candidate_bauds {
        anyhow::ensure!(bauds.iter().all(|&b| b > 0), "link.candidate_bauds contains 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        check_link(&LinkConfig::default()).unwrap();
    }

    #[test]
    fn needs_url_or_autodetect() {
        let mut cfg = LinkConfig { connect: None, ..Default::default() };
        assert!(check_link(&cfg).is_err());
        cfg.autodetect = true;
        check_link(&cfg).unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        assert!(check_link(&LinkConfig { sys_id: 0, ..Default::default() }).is_err());
        assert!(check_link(&LinkConfig { command_timeout_ms: 5, ..Default::default() }).is_err());
        assert!(check_link(&LinkConfig { send_heartbeat_hz: Some(0.0), ..Default::default() }).is_err());
    }
}
