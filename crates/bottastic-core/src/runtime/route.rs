use bottastic_types::node::NodeNum;

/// Which handler an inbound text message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Broadcast,
    Direct,
}

/// Classify a packet by its target address.
///
/// `None` means the packet is addressed to some other node.
pub fn classify(to: NodeNum, my_num: NodeNum) -> Option<Route> {
    if to.is_broadcast() {
        Some(Route::Broadcast)
    } else if to == my_num {
        Some(Route::Direct)
    } else {
        None
    }
}
