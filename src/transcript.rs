use crate::render::RenderedItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: RenderedItem,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: RenderedItem::Text(text.into()),
        }
    }

    pub fn assistant(content: RenderedItem) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::assistant(RenderedItem::Text(text.into()))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            RenderedItem::Text(text) => Some(text),
            RenderedItem::Image(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    scroll_to_latest: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.scroll_to_latest = true;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// True once after every append; the view scrolls to the newest message
    /// when it sees it.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_latest)
    }
}
