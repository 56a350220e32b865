mod test_deny_keeps_guest_out;
mod test_waiting_room_flow;
