use crate::storage::Episode;
use crate::util::escape_html;

/// Label of the trailing link back to the episode list.
const COLLECTION_LABEL: &str = "Episode list";

/// One line of a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderItem {
    pub title: String,
    pub url: String,
    /// Start time in display format.
    pub start: String,
}

/// Everything a notifier needs to compose its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub items: Vec<ReminderItem>,
    pub collection_url: Option<String>,
}

impl Reminder {
    pub fn new(episodes: &[&Episode], collection_url: Option<&str>) -> Self {
        Self {
            items: episodes
                .iter()
                .map(|e| ReminderItem {
                    title: e.title.clone(),
                    url: e.url.clone(),
                    start: e.display_start(),
                })
                .collect(),
            collection_url: collection_url.map(str::to_string),
        }
    }

    /// Plain-text mail body: title, start and link per episode, then the
    /// collection link.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str(&format!("{} ({})\n{}\n\n", item.title, item.start, item.url));
        }
        if let Some(url) = &self.collection_url {
            out.push_str(&format!("{COLLECTION_LABEL}: {url}\n"));
        }
        out
    }

    /// HTML mail body with linked titles.
    pub fn html(&self) -> String {
        let mut out = String::from("<ul>\n");
        for item in &self.items {
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a> {}</li>\n",
                escape_html(&item.url),
                escape_html(&item.title),
                escape_html(&item.start)
            ));
        }
        out.push_str("</ul>\n");
        if let Some(url) = &self.collection_url {
            out.push_str(&format!(
                "<p><a href=\"{}\">{COLLECTION_LABEL}</a></p>\n",
                escape_html(url)
            ));
        }
        out
    }

    /// Slack mrkdwn: one `<url|title>` link per line, then the collection
    /// link.
    pub fn slack_text(&self) -> String {
        let mut lines: Vec<String> = self
            .items
            .iter()
            .map(|item| format!("<{}|{}>", escape_slack_url(&item.url), escape_slack(&item.title)))
            .collect();
        if let Some(url) = &self.collection_url {
            lines.push(format!("<{}|{COLLECTION_LABEL}>", escape_slack_url(url)));
        }
        lines.join("\n")
    }
}

/// Slack control characters: `&`, `<`, `>`.
fn escape_slack(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A `|` ends the URL part of a `<url|label>` link, so it is
/// percent-encoded there. Labels keep theirs.
fn escape_slack_url(s: &str) -> String {
    escape_slack(s).replace('|', "%7C")
}
