use std::future::Future;
use std::sync::Arc;

use teloxide::types::{MessageEntity, MessageEntityKind};
use teloxide::utils::html::escape;
use tokio::time::{Duration, sleep};

use crate::database::DatabasePool;
use crate::roles::RoleFilter;

/// Pacing between consecutive sends, matching Telegram flood limits.
pub const SEND_DELAY: Duration = Duration::from_millis(50);

/// Renders a composed message to well-formed HTML: formatting entities
/// become tags, everything else is escaped. Plain text with a bare `<` or
/// `&` survives `ParseMode::Html` delivery this way, and client formatting
/// (bold, links, ...) is preserved instead of being dropped.
pub fn render_broadcast_html(text: &str, entities: &[MessageEntity]) -> String {
    // Entity offsets and lengths are in UTF-16 code units.
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut sorted: Vec<&MessageEntity> = entities.iter().collect();
    // Parents before their nested children.
    sorted.sort_by_key(|e| (e.offset, std::cmp::Reverse(e.length)));
    render_range(&units, 0, units.len(), &sorted)
}

fn render_range(units: &[u16], start: usize, end: usize, entities: &[&MessageEntity]) -> String {
    let mut out = String::new();
    let mut pos = start;
    let mut idx = 0;

    while idx < entities.len() {
        let entity = entities[idx];
        let e_start = entity.offset;
        let e_end = entity.offset + entity.length;
        if e_start < pos || e_end > end {
            idx += 1;
            continue;
        }

        out.push_str(&escape(&slice_utf16(units, pos, e_start)));

        let mut next = idx + 1;
        while next < entities.len() && entities[next].offset < e_end {
            next += 1;
        }
        let inner = render_range(units, e_start, e_end, &entities[idx + 1..next]);
        out.push_str(&wrap_entity(&entity.kind, inner));

        pos = e_end;
        idx = next;
    }

    out.push_str(&escape(&slice_utf16(units, pos, end)));
    out
}

fn wrap_entity(kind: &MessageEntityKind, inner: String) -> String {
    match kind {
        MessageEntityKind::Bold => format!("<b>{}</b>", inner),
        MessageEntityKind::Italic => format!("<i>{}</i>", inner),
        MessageEntityKind::Underline => format!("<u>{}</u>", inner),
        MessageEntityKind::Strikethrough => format!("<s>{}</s>", inner),
        MessageEntityKind::Spoiler => format!("<tg-spoiler>{}</tg-spoiler>", inner),
        MessageEntityKind::Code => format!("<code>{}</code>", inner),
        MessageEntityKind::Pre { .. } => format!("<pre>{}</pre>", inner),
        MessageEntityKind::TextLink { url } => format!("<a href=\"{}\">{}</a>", url, inner),
        // Mentions, hashtags, urls etc. render as their plain text.
        _ => inner,
    }
}

fn slice_utf16(units: &[u16], start: usize, end: usize) -> String {
    let start = start.min(units.len());
    let end = end.min(units.len());
    String::from_utf16_lossy(&units[start..end])
}

/// Sequentially delivers to every recipient. The sleep before each send is
/// an await point, so other sessions stay serviceable while a broadcast
/// runs. One recipient failing never aborts the batch.
pub async fn deliver_all<F, Fut>(user_ids: &[i64], delay: Duration, mut send: F) -> (i64, i64)
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut sent = 0;
    let mut failed = 0;

    for &user_id in user_ids {
        sleep(delay).await;
        match send(user_id).await {
            Ok(()) => sent += 1,
            Err(e) => {
                log::warn!("Failed to deliver broadcast to {}: {}", user_id, e);
                failed += 1;
            }
        }
    }

    (sent, failed)
}

/// Resolves recipients for the filter, delivers through `send`, and appends
/// one audit row with the count actually reached. Returns (sent, failed).
/// The transport is injected so delivery and accounting can be exercised
/// without a live bot.
pub async fn run_broadcast<F, Fut>(
    db_pool: &Arc<DatabasePool>,
    admin_id: i64,
    filter: RoleFilter,
    message: &str,
    send: F,
) -> anyhow::Result<(i64, i64)>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let targets = db_pool.list_broadcast_targets(filter).await?;
    log::info!(
        "Admin {} broadcasting to {} users (filter: {})",
        admin_id,
        targets.len(),
        filter.code()
    );

    let (sent, failed) = deliver_all(&targets, SEND_DELAY, send).await;

    db_pool
        .record_broadcast(admin_id, filter, message.to_string(), sent)
        .await?;

    Ok((sent, failed))
}

pub fn report_text(sent: i64, failed: i64) -> String {
    format!(
        "✅ Broadcast finished!\n\nSent: {}\nFailed: {}",
        sent, failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_database;
    use crate::roles::Role;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let delivered = Mutex::new(Vec::new());

        let (sent, failed) = deliver_all(&[1, 2, 3], Duration::ZERO, |user_id| {
            let delivered = &delivered;
            async move {
                delivered.lock().unwrap().push(user_id);
                if user_id == 2 {
                    anyhow::bail!("forced delivery failure");
                }
                Ok(())
            }
        })
        .await;

        assert_eq!((sent, failed), (2, 1));
        assert_eq!(*delivered.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sent_plus_failed_equals_targets() {
        let ids: Vec<i64> = (1..=10).collect();
        let (sent, failed) = deliver_all(&ids, Duration::ZERO, |user_id| async move {
            if user_id % 3 == 0 {
                anyhow::bail!("unreachable user");
            }
            Ok(())
        })
        .await;

        assert_eq!(sent + failed, ids.len() as i64);
        assert_eq!(failed, 3);
    }

    #[tokio::test]
    async fn test_empty_recipient_list() {
        let (sent, failed) =
            deliver_all(&[], Duration::ZERO, |_| async move { Ok(()) }).await;
        assert_eq!((sent, failed), (0, 0));
    }

    #[tokio::test]
    async fn test_run_broadcast_persists_sent_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        init_database(&path).unwrap();
        let pool = Arc::new(DatabasePool::new(path, 3));

        for id in 1..=4 {
            pool.upsert_user(id, None, format!("User {}", id)).await.unwrap();
        }
        for id in [1, 2, 3] {
            pool.set_role(id, Some(Role::Student)).await.unwrap();
        }

        let (sent, failed) = run_broadcast(
            &pool,
            9,
            RoleFilter::Only(Role::Student),
            "Exam tomorrow",
            |user_id| async move {
                if user_id == 2 {
                    anyhow::bail!("blocked the bot");
                }
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!((sent, failed), (2, 1));

        let (admin_id, role_filter, message, recipients): (i64, String, String, i64) = pool
            .execute_with_timeout(|conn| {
                conn.query_row(
                    "SELECT admin_id, role_filter, message, recipients_count
                     FROM broadcast_history",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )
            })
            .await
            .unwrap();
        assert_eq!(admin_id, 9);
        assert_eq!(role_filter, "student");
        assert_eq!(message, "Exam tomorrow");
        assert_eq!(recipients, 2);
    }

    #[test]
    fn test_report_text() {
        assert_eq!(report_text(2, 1), "✅ Broadcast finished!\n\nSent: 2\nFailed: 1");
    }

    fn entity(kind: MessageEntityKind, offset: usize, length: usize) -> MessageEntity {
        MessageEntity {
            kind,
            offset,
            length,
        }
    }

    #[test]
    fn test_plain_text_special_chars_are_escaped() {
        assert_eq!(
            render_broadcast_html("Scores < 50 must retake", &[]),
            "Scores &lt; 50 must retake"
        );
        assert_eq!(render_broadcast_html("<3", &[]), "&lt;3");
        assert_eq!(render_broadcast_html("A & B", &[]), "A &amp; B");
    }

    #[test]
    fn test_formatting_entities_become_tags() {
        let html = render_broadcast_html(
            "Exam tomorrow",
            &[entity(MessageEntityKind::Bold, 0, 4)],
        );
        assert_eq!(html, "<b>Exam</b> tomorrow");

        let html = render_broadcast_html(
            "use find_all now",
            &[entity(MessageEntityKind::Code, 4, 8)],
        );
        assert_eq!(html, "use <code>find_all</code> now");
    }

    #[test]
    fn test_special_chars_inside_entity_are_escaped() {
        let html = render_broadcast_html("a<b", &[entity(MessageEntityKind::Bold, 0, 3)]);
        assert_eq!(html, "<b>a&lt;b</b>");
    }

    #[test]
    fn test_nested_entities() {
        let html = render_broadcast_html(
            "bold italic",
            &[
                entity(MessageEntityKind::Bold, 0, 11),
                entity(MessageEntityKind::Italic, 5, 6),
            ],
        );
        assert_eq!(html, "<b>bold <i>italic</i></b>");
    }

    #[test]
    fn test_offsets_are_utf16_units() {
        // The emoji occupies two UTF-16 code units, so "exam" starts at 3.
        let html = render_broadcast_html(
            "🎓 exam",
            &[entity(MessageEntityKind::Bold, 3, 4)],
        );
        assert_eq!(html, "🎓 <b>exam</b>");
    }

    #[test]
    fn test_non_formatting_entities_stay_plain() {
        let html = render_broadcast_html(
            "/start now",
            &[entity(MessageEntityKind::BotCommand, 0, 6)],
        );
        assert_eq!(html, "/start now");
    }
}
