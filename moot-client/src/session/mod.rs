mod negotiation;

pub use negotiation::{NegotiationSession, SessionPhase};
