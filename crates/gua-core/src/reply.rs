use crate::ImageData;

pub const HEADER: &str = "🔮 周易金钱卦推算结果：";
pub const FOOTER: &str = "\n『卦象已显，吉凶自辨』";
pub const POOL_UNAVAILABLE: &str = "未找到卦象图片，请联系管理员检查插件配置";
pub const RENDER_FAILED: &str = "卦象显化失败，请稍后再试";
pub const FAILED: &str = "卦象推算异常，请联系管理员";

/// One piece of a composed chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Image(ImageData),
    Mention {
        user_id: String,
        display_name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Drawn {
        image: String,
        /// `None` when draws are unlimited
        remaining: Option<u32>,
        draw: Option<u32>,
    },
    QuotaExhausted,
    PoolUnavailable,
    RenderFailed,
    Failed,
}

impl Outcome {
    /// Outcomes the host should present as a failed command.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Outcome::PoolUnavailable | Outcome::RenderFailed | Outcome::Failed
        )
    }
}

/// A reply to one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub outcome: Outcome,
    pub segments: Vec<Segment>,
}

impl Reply {
    pub fn plain(outcome: Outcome, text: &str) -> Self {
        Self {
            outcome,
            segments: vec![Segment::Plain(text.to_string())],
        }
    }

    pub fn pool_unavailable() -> Self {
        Self::plain(Outcome::PoolUnavailable, POOL_UNAVAILABLE)
    }

    pub fn render_failed() -> Self {
        Self::plain(Outcome::RenderFailed, RENDER_FAILED)
    }

    pub fn failed() -> Self {
        Self::plain(Outcome::Failed, FAILED)
    }

    pub fn quota_exhausted(mention: Segment, daily_limit: u32) -> Self {
        Self {
            outcome: Outcome::QuotaExhausted,
            segments: vec![
                mention,
                Segment::Plain(format!(
                    " 今日起卦次数已用完（每日 {daily_limit} 次），请明日再来，次数于零点重置"
                )),
            ],
        }
    }

    pub fn drawn(image: ImageData, quota: Option<(u32, u32)>) -> Self {
        let name = image.name.clone();
        let mut segments = vec![
            Segment::Plain(HEADER.to_string()),
            Segment::Image(image),
            Segment::Plain(FOOTER.to_string()),
        ];
        if let Some((remaining, draw)) = quota {
            segments.push(Segment::Plain(format!(
                "\n今日第 {draw} 卦，剩余 {remaining} 次"
            )));
        }
        Self {
            outcome: Outcome::Drawn {
                image: name,
                remaining: quota.map(|(remaining, _)| remaining),
                draw: quota.map(|(_, draw)| draw),
            },
            segments,
        }
    }

    /// Concatenated plain-text segments, mentions rendered as `@name`.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Plain(text) => Some(text.clone()),
                Segment::Mention {
                    user_id,
                    display_name,
                } => Some(mention_text(user_id, display_name.as_deref())),
                Segment::Image(_) => None,
            })
            .collect()
    }

    pub fn image(&self) -> Option<&ImageData> {
        self.segments.iter().find_map(|segment| match segment {
            Segment::Image(image) => Some(image),
            _ => None,
        })
    }
}

pub fn mention_text(user_id: &str, display_name: Option<&str>) -> String {
    format!("@{}", display_name.unwrap_or(user_id))
}
