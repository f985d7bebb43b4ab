use fogbound_core::bubble::BubbleState;

/// What a click on a bubble means given where the bubble is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickAction {
    Expand,
    NextPage,
    Pop,
    Ignore,
}

#[inline]
pub fn click_action(state: Option<BubbleState>, page: usize, total_pages: usize) -> ClickAction {
    match state {
        Some(BubbleState::Idle) => ClickAction::Expand,
        Some(BubbleState::Revealed) if page < total_pages => ClickAction::NextPage,
        Some(BubbleState::Revealed | BubbleState::Paginating) if page >= total_pages => {
            ClickAction::Pop
        }
        _ => ClickAction::Ignore,
    }
}
