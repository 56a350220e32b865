use moot_core::model::IceServerConfig;

/// ICE configuration for outgoing peer links. Reflexive discovery only; a
/// known traversal limitation under symmetric NAT.
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub servers: Vec<IceServerConfig>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                IceServerConfig::stun("stun:stun.l.google.com:19302"),
                IceServerConfig::stun("stun:stun1.l.google.com:19302"),
            ],
        }
    }
}
