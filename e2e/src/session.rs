//! Browser sessions: one isolated browser context and its page per simulated user.

use anyhow::Result;
use playwright::api::{Browser, Page};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Key names understood by [`Session::press`].
pub mod keys {
    pub const ENTER: &str = "Enter";
}

/// CSS selector for the element with the given `id`.
pub fn by_id(id: &str) -> String {
    format!("#{}", id)
}

/// The single page of an isolated browser context, sharing no cookies or
/// storage with other sessions.
#[derive(Clone)]
pub struct Session {
    page: Page,
}

impl Session {
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto_builder(url).goto().await?;
        Ok(())
    }

    pub async fn title(&self) -> Result<String> {
        Ok(self.page.title().await?)
    }

    pub fn current_url(&self) -> Result<String> {
        Ok(self.page.url()?)
    }

    /// Rendered text of the first element matching `selector`.
    pub async fn text(&self, selector: &str) -> Result<String> {
        Ok(self.page.inner_text(selector, None).await?)
    }

    pub async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        Ok(self.page.get_attribute(selector, name, None).await?)
    }

    /// Rendered text of every element currently matching `selector`, trimmed.
    ///
    /// Does not wait for matches to appear: an empty page yields an empty list.
    pub async fn texts(&self, selector: &str) -> Result<Vec<String>> {
        let elements = self.page.query_selector_all(selector).await?;
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            texts.push(element.inner_text().await?.trim().to_owned());
        }
        Ok(texts)
    }

    /// Types `text` into the element matching `selector`, key by key.
    pub async fn send_keys(&self, selector: &str, text: &str) -> Result<()> {
        self.page
            .main_frame()
            .type_builder(selector, text)
            .r#type()
            .await?;
        Ok(())
    }

    pub async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.page.press_builder(selector, key).press().await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.page.context().close().await?;
        Ok(())
    }
}

/// Opens sessions on one browser and remembers them, so that whatever a test
/// opened can be closed once it is over, however it ended.
#[derive(Clone)]
pub struct Sessions {
    browser: Arc<Browser>,
    opened: Arc<Mutex<Vec<Session>>>,
}

impl Sessions {
    pub fn new(browser: Arc<Browser>) -> Self {
        Sessions {
            browser,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn open(&self) -> Result<Session> {
        let context = self.browser.context_builder().build().await?;
        let page = context.new_page().await?;
        let session = Session { page };
        self.opened.lock().await.push(session.clone());
        Ok(session)
    }

    /// Closes every session opened so far. Sessions a test already closed
    /// itself fail to close again; that is only logged.
    pub async fn close_all(&self) {
        let sessions = std::mem::take(&mut *self.opened.lock().await);
        for session in sessions {
            if let Err(err) = session.close().await {
                debug!(error = %err, "session was already closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_selector() {
        assert_eq!(by_id("id_list_table"), "#id_list_table");
    }
}
