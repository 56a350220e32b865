mod test_candidate_queue;
mod test_peer_leave_teardown;
mod test_session_teardown;
mod test_two_peers_negotiate;
