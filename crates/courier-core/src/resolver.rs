//! Recipient resolution: turns explicit id lists and guild discovery into
//! an ordered, duplicate-free target set.

use std::collections::HashSet;

use tracing::warn;

use crate::{
    domain::{GuildId, GuildMember, GuildSummary, Recipient, UserId},
    platform::PlatformSession,
    Result,
};

/// Build the target list for a bulk dispatch.
///
/// Explicit ids come first, in caller order. When `select_all` is set,
/// members discovered from the session's guilds are appended in guild
/// order, skipping bot accounts and ids already present. Failing to list
/// one guild's members skips that guild; failing to list the guilds at
/// all fails the resolution.
pub async fn resolve_targets(
    session: &dyn PlatformSession,
    explicit_ids: &[UserId],
    select_all: bool,
) -> Result<Vec<UserId>> {
    let mut seen: HashSet<UserId> = HashSet::new();
    let mut targets: Vec<UserId> = Vec::new();

    for id in explicit_ids {
        if seen.insert(id.clone()) {
            targets.push(id.clone());
        }
    }

    if select_all {
        let guilds = session.list_guilds().await?;
        let mut skipped = 0usize;
        for guild in &guilds {
            let members = match session.list_members(&guild.id).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(guild = %guild.id, "skipping guild during member discovery: {e}");
                    skipped += 1;
                    continue;
                }
            };
            for member in members {
                if member.is_bot {
                    continue;
                }
                if seen.insert(member.id.clone()) {
                    targets.push(member.id);
                }
            }
        }
        if skipped > 0 {
            warn!(
                "member discovery skipped {skipped} of {} guilds",
                guilds.len()
            );
        }
    }

    Ok(targets)
}

/// Preview the human members a dispatch would reach.
///
/// With a guild id, lists that one guild and any failure is the caller's.
/// Without one, aggregates every visible guild, deduplicating by user id;
/// a member seen in several guilds keeps the tag of the guild it was
/// first found in, and guilds that fail to enumerate are skipped.
pub async fn preview_members(
    session: &dyn PlatformSession,
    guild: Option<&GuildId>,
) -> Result<Vec<Recipient>> {
    let mut seen: HashSet<UserId> = HashSet::new();
    let mut recipients: Vec<Recipient> = Vec::new();

    if let Some(id) = guild {
        let summary = session.get_guild(id).await?;
        let members = session.list_members(&summary.id).await?;
        absorb(&summary, members, &mut seen, &mut recipients);
        return Ok(recipients);
    }

    for summary in session.list_guilds().await? {
        let members = match session.list_members(&summary.id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(guild = %summary.id, "skipping guild during member preview: {e}");
                continue;
            }
        };
        absorb(&summary, members, &mut seen, &mut recipients);
    }

    Ok(recipients)
}

fn absorb(
    guild: &GuildSummary,
    members: Vec<GuildMember>,
    seen: &mut HashSet<UserId>,
    out: &mut Vec<Recipient>,
) {
    for member in members {
        if member.is_bot || !seen.insert(member.id.clone()) {
            continue;
        }
        out.push(Recipient {
            id: member.id,
            display_name: member.display_name,
            is_bot: false,
            guild_id: guild.id.clone(),
            guild_name: guild.name.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BotIdentity, GuildMember, InboundMessage, PlatformUser};
    use crate::Error;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    struct FakeSession {
        guilds: Vec<GuildSummary>,
        members: HashMap<String, Vec<GuildMember>>,
        broken_guilds: HashSet<String>,
        guilds_unavailable: bool,
    }

    impl FakeSession {
        fn new() -> Self {
            Self {
                guilds: Vec::new(),
                members: HashMap::new(),
                broken_guilds: HashSet::new(),
                guilds_unavailable: false,
            }
        }

        fn with_guild(mut self, id: &str, name: &str, members: &[(&str, bool)]) -> Self {
            self.guilds.push(GuildSummary {
                id: GuildId(id.to_string()),
                name: name.to_string(),
                member_count: members.len() as u64,
                icon_url: None,
            });
            self.members.insert(
                id.to_string(),
                members
                    .iter()
                    .map(|(user, is_bot)| GuildMember {
                        id: UserId(user.to_string()),
                        display_name: user.to_string(),
                        is_bot: *is_bot,
                    })
                    .collect(),
            );
            self
        }

        fn with_broken_guild(mut self, id: &str, name: &str) -> Self {
            self.guilds.push(GuildSummary {
                id: GuildId(id.to_string()),
                name: name.to_string(),
                member_count: 0,
                icon_url: None,
            });
            self.broken_guilds.insert(id.to_string());
            self
        }

        fn without_guild_listing(mut self) -> Self {
            self.guilds_unavailable = true;
            self
        }
    }

    #[async_trait]
    impl PlatformSession for FakeSession {
        fn identity(&self) -> BotIdentity {
            BotIdentity {
                user_id: UserId("bot".to_string()),
                username: "courier".to_string(),
            }
        }

        async fn list_guilds(&self) -> Result<Vec<GuildSummary>> {
            if self.guilds_unavailable {
                return Err(Error::Platform("guild listing unavailable".to_string()));
            }
            Ok(self.guilds.clone())
        }

        async fn get_guild(&self, guild: &GuildId) -> Result<GuildSummary> {
            self.guilds
                .iter()
                .find(|g| g.id == *guild)
                .cloned()
                .ok_or_else(|| Error::Platform(format!("unknown guild {guild}")))
        }

        async fn list_members(&self, guild: &GuildId) -> Result<Vec<GuildMember>> {
            if self.broken_guilds.contains(&guild.0) {
                return Err(Error::Platform(format!("members unavailable for {guild}")));
            }
            self.members
                .get(&guild.0)
                .cloned()
                .ok_or_else(|| Error::Platform(format!("unknown guild {guild}")))
        }

        async fn resolve_user(&self, _id: &UserId) -> Result<PlatformUser> {
            Err(Error::Platform("not used in resolver tests".to_string()))
        }

        async fn send_dm(&self, _user: &UserId, _text: &str) -> Result<()> {
            Err(Error::Platform("not used in resolver tests".to_string()))
        }

        fn take_events(&self) -> Option<mpsc::Receiver<InboundMessage>> {
            None
        }

        async fn destroy(&self) {}
    }

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|s| UserId(s.to_string())).collect()
    }

    #[tokio::test]
    async fn explicit_ids_keep_caller_order_and_deduplicate() {
        let session = FakeSession::new();
        let targets = resolve_targets(&session, &ids(&["b", "a", "b", "c", "a"]), false)
            .await
            .unwrap();
        assert_eq!(targets, ids(&["b", "a", "c"]));
    }

    #[tokio::test]
    async fn select_all_appends_discovered_members_after_explicit_ids() {
        let session = FakeSession::new()
            .with_guild("g1", "First", &[("m1", false), ("m2", true), ("a", false)])
            .with_guild("g2", "Second", &[("m3", false), ("m1", false)]);

        let targets = resolve_targets(&session, &ids(&["a"]), true).await.unwrap();

        // "a" stays in its explicit slot, the bot "m2" is dropped, and
        // "m1" appears once even though both guilds contain it.
        assert_eq!(targets, ids(&["a", "m1", "m3"]));
    }

    #[tokio::test]
    async fn discovery_without_select_all_never_touches_guilds() {
        let session = FakeSession::new().without_guild_listing();
        let targets = resolve_targets(&session, &ids(&["a"]), false).await.unwrap();
        assert_eq!(targets, ids(&["a"]));
    }

    #[tokio::test]
    async fn broken_guild_is_skipped_without_failing_resolution() {
        let session = FakeSession::new()
            .with_broken_guild("g1", "Broken")
            .with_guild("g2", "Fine", &[("x", false)]);

        let targets = resolve_targets(&session, &[], true).await.unwrap();
        assert_eq!(targets, ids(&["x"]));
    }

    #[tokio::test]
    async fn guild_listing_failure_fails_select_all_resolution() {
        let session = FakeSession::new().without_guild_listing();
        let err = resolve_targets(&session, &[], true).await.unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
    }

    #[tokio::test]
    async fn preview_tags_members_with_the_first_guild_they_appear_in() {
        let session = FakeSession::new()
            .with_guild("g1", "First", &[("x", false), ("y", false)])
            .with_guild("g2", "Second", &[("x", false), ("z", false)]);

        let recipients = preview_members(&session, None).await.unwrap();

        let tags: Vec<(&str, &str)> = recipients
            .iter()
            .map(|r| (r.id.0.as_str(), r.guild_name.as_str()))
            .collect();
        assert_eq!(
            tags,
            vec![("x", "First"), ("y", "First"), ("z", "Second")]
        );
    }

    #[tokio::test]
    async fn preview_excludes_bot_accounts() {
        let session = FakeSession::new().with_guild("g1", "First", &[("x", false), ("b", true)]);
        let recipients = preview_members(&session, None).await.unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].id, UserId("x".to_string()));
        assert!(!recipients[0].is_bot);
    }

    #[tokio::test]
    async fn preview_scoped_to_one_guild_lists_only_that_guild() {
        let session = FakeSession::new()
            .with_guild("g1", "First", &[("x", false)])
            .with_guild("g2", "Second", &[("y", false)]);

        let recipients = preview_members(&session, Some(&GuildId("g2".to_string())))
            .await
            .unwrap();

        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].id, UserId("y".to_string()));
        assert_eq!(recipients[0].guild_name, "Second");
    }

    #[tokio::test]
    async fn preview_scoped_to_a_broken_guild_propagates_the_failure() {
        let session = FakeSession::new().with_broken_guild("g1", "Broken");
        let err = preview_members(&session, Some(&GuildId("g1".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
    }

    #[tokio::test]
    async fn preview_skips_broken_guilds_in_aggregate_mode() {
        let session = FakeSession::new()
            .with_broken_guild("g1", "Broken")
            .with_guild("g2", "Fine", &[("x", false)]);

        let recipients = preview_members(&session, None).await.unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].guild_name, "Fine");
    }
}
