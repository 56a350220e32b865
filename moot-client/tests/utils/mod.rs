mod fake_link;

pub use fake_link::{FAKE_CANDIDATES, FakeLink, FakeLinkFactory};
