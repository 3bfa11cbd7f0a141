use crate::peer::types::ServerConfig;

/// Wall clock in milliseconds since the epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Adds the `stun:`/`turn:` scheme to an ICE server URL when it is missing
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:")
        || config.url.starts_with("turns:")
        || config.url.starts_with("stun:")
    {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_added_by_server_type() {
        let stun = ServerConfig::stun("stun.example.org:3478");
        assert_eq!(add_ice_url_scheme(&stun), "stun:stun.example.org:3478");

        let turn = ServerConfig::turn("turn.example.org", Some("u".into()), Some("p".into()));
        assert_eq!(add_ice_url_scheme(&turn), "turn:turn.example.org");
    }

    #[test]
    fn existing_scheme_kept() {
        let turn = ServerConfig::turn("turns:relay.example.org:443", None, None);
        assert_eq!(add_ice_url_scheme(&turn), "turns:relay.example.org:443");
    }
}
