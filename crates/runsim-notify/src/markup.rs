use runsim_core::{ArchiveKind, ArtifactLink, Notice};

/// Link syntax of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    Slack,
    GitHub,
}

fn label(kind: ArchiveKind) -> &'static str {
    match kind {
        ArchiveKind::Ok => "OK",
        ArchiveKind::Failed => "FAILED",
        ArchiveKind::Exports => "Exports",
    }
}

impl Markup {
    /// Failed-log links are rendered bold.
    pub fn link(self, link: &ArtifactLink) -> String {
        let name = label(link.kind);
        let url = &link.url;
        match (self, link.kind) {
            (Markup::Slack, ArchiveKind::Failed) => format!("*<{url}|{name}>*"),
            (Markup::Slack, _) => format!("<{url}|{name}>"),
            (Markup::GitHub, ArchiveKind::Failed) => format!("[**{name}**]({url})"),
            (Markup::GitHub, _) => format!("[{name}]({url})"),
        }
    }

    /// Headline, then every link followed by a space, then a newline.
    pub fn render(self, notice: &Notice) -> String {
        let mut out = notice.headline.clone();
        for link in &notice.links {
            out.push_str(&self.link(link));
            out.push(' ');
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> Vec<ArtifactLink> {
        vec![
            ArtifactLink {
                kind: ArchiveKind::Ok,
                url: "https://b/ok.zip".into(),
            },
            ArtifactLink {
                kind: ArchiveKind::Failed,
                url: "https://b/failed.zip".into(),
            },
            ArtifactLink {
                kind: ArchiveKind::Exports,
                url: "https://b/exports.zip".into(),
            },
        ]
    }

    #[test]
    fn slack_links() {
        let notice = Notice::finished("h1", links());
        assert_eq!(
            Markup::Slack.render(&notice),
            "Host h1 finished simulation. Logs: <https://b/ok.zip|OK> \
             *<https://b/failed.zip|FAILED>* <https://b/exports.zip|Exports> \n"
        );
    }

    #[test]
    fn github_links() {
        let notice = Notice::finished("h1", links());
        assert_eq!(
            Markup::GitHub.render(&notice),
            "Host h1 finished simulation. Logs: [OK](https://b/ok.zip) \
             [**FAILED**](https://b/failed.zip) [Exports](https://b/exports.zip) \n"
        );
    }

    #[test]
    fn error_notice_has_no_links() {
        let notice = Notice::error("h1", "upload", "denied");
        assert_eq!(Markup::Slack.render(&notice), "Host h1: ERROR: upload: denied\n");
    }
}
