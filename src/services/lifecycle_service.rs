//! Scheduled sweeps (auto-create, auto-lock, backup) and fixture bookkeeping.
//!
//! Each sweep re-reads the collections it works on and re-checks its predicate,
//! so an external scheduler may trigger it as often as it likes.

use std::time::{Duration, SystemTime};

use time::{OffsetDateTime, Time};
use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::models::{FixtureEntity, SquadEntity, VoteModuleEntity, VoteResultEntity, module_id},
    dto::{
        lifecycle::{
            AutoCreateReport, AutoLockReport, BackupReport, FixtureInput, FixtureView,
            FixtureWindow, FixturesQuery, ImportResponse, LifecycleReport, SquadInput,
        },
        validation::validate_unique_ids,
    },
    error::ServiceError,
    services::vote_service::standings,
    state::SharedState,
};

/// Title given to modules opened by the auto-create sweep.
pub const AUTO_MODULE_TITLE: &str = "Man of the Match";
const SECONDS_PER_DAY: u64 = 86_400;

/// Position of `now` relative to a match starting at `kickoff` and lasting `duration`.
pub fn classify(kickoff: SystemTime, now: SystemTime, duration: Duration) -> FixtureWindow {
    if now < kickoff {
        FixtureWindow::Upcoming
    } else if kickoff.checked_add(duration).is_none_or(|end| now < end) {
        FixtureWindow::Live
    } else {
        FixtureWindow::Finished
    }
}

/// `[start, end)` of the UTC day containing `now`.
pub fn utc_day_bounds(now: SystemTime) -> (SystemTime, SystemTime) {
    let midnight = OffsetDateTime::from(now).replace_time(Time::MIDNIGHT);
    let start = SystemTime::from(midnight);
    (start, start + Duration::from_secs(SECONDS_PER_DAY))
}

/// Open one module per side of every fixture kicking off on the UTC day of `now`.
///
/// Sides without a registered squad are skipped, as are modules that already exist.
pub async fn auto_create(
    state: &SharedState,
    now: SystemTime,
) -> Result<AutoCreateReport, ServiceError> {
    let store = state.require_vote_store().await?;
    let (from, to) = utc_day_bounds(now);
    let fixtures = state
        .bounded(store.list_fixtures_between(from, to))
        .await?;

    let mut report = AutoCreateReport {
        scanned: fixtures.len(),
        ..AutoCreateReport::default()
    };

    for fixture in &fixtures {
        let sides = [
            (&fixture.home_team_id, &fixture.away_team),
            (&fixture.away_team_id, &fixture.home_team),
        ];
        for (team_id, opponent) in sides {
            let Some(squad) = state.bounded(store.find_squad(team_id.clone())).await? else {
                warn!(fixture_id = %fixture.id, %team_id, "no squad registered; skipping side");
                report.skipped += 1;
                continue;
            };
            if squad.players.is_empty() {
                warn!(fixture_id = %fixture.id, %team_id, "squad has no players; skipping side");
                report.skipped += 1;
                continue;
            }

            let Some(module) =
                auto_module(fixture, squad, opponent, state.config().vote_window, now)
            else {
                warn!(
                    fixture_id = %fixture.id,
                    %team_id,
                    "vote window overflows kickoff; skipping side"
                );
                report.skipped += 1;
                continue;
            };
            let id = module.id.clone();
            if state.bounded(store.create_module(module)).await? {
                report.created.push(id);
            } else {
                report.skipped += 1;
            }
        }
    }

    info!(
        scanned = report.scanned,
        created = report.created.len(),
        skipped = report.skipped,
        "auto-create sweep finished"
    );
    Ok(report)
}

fn auto_module(
    fixture: &FixtureEntity,
    squad: SquadEntity,
    opponent: &str,
    vote_window: Duration,
    now: SystemTime,
) -> Option<VoteModuleEntity> {
    let expires_at = fixture.kickoff.checked_add(vote_window)?;
    Some(VoteModuleEntity {
        id: module_id(&squad.id, &fixture.id),
        match_id: fixture.id.clone(),
        title: AUTO_MODULE_TITLE.to_owned(),
        opponent: opponent.to_owned(),
        kickoff: fixture.kickoff,
        expires_at,
        locked: false,
        candidates: squad.players.into_iter().map(Into::into).collect(),
        created_at: now,
        updated_at: now,
        team_id: squad.id,
    })
}

/// Lock every open module whose `expires_at` lies before `now`.
pub async fn auto_lock(
    state: &SharedState,
    now: SystemTime,
) -> Result<AutoLockReport, ServiceError> {
    let store = state.require_vote_store().await?;
    let modules = state.bounded(store.list_modules()).await?;

    let mut report = AutoLockReport {
        scanned: modules.len(),
        ..AutoLockReport::default()
    };

    for module in modules {
        if module.locked || now <= module.expires_at {
            continue;
        }
        if state
            .bounded(store.lock_module(module.id.clone()))
            .await?
            .is_some()
        {
            report.locked.push(module.id);
        }
    }

    info!(
        scanned = report.scanned,
        locked = report.locked.len(),
        "auto-lock sweep finished"
    );
    Ok(report)
}

/// Freeze the standings of a locked module.
pub fn build_result(module: VoteModuleEntity, archived_at: SystemTime) -> VoteResultEntity {
    let total_votes = module.total_votes();
    let candidates = standings(&module.candidates);
    let winner_id = candidates
        .first()
        .filter(|candidate| candidate.votes > 0)
        .map(|candidate| candidate.id.clone());

    VoteResultEntity {
        module_id: module.id,
        team_id: module.team_id,
        match_id: module.match_id,
        title: module.title,
        opponent: module.opponent,
        kickoff: module.kickoff,
        candidates,
        total_votes,
        winner_id,
        archived_at,
    }
}

/// Archive every locked module that has no result yet.
pub async fn backup(state: &SharedState, now: SystemTime) -> Result<BackupReport, ServiceError> {
    let store = state.require_vote_store().await?;
    let modules = state.bounded(store.list_modules()).await?;

    let mut report = BackupReport {
        scanned: modules.len(),
        ..BackupReport::default()
    };

    for module in modules.into_iter().filter(|module| module.locked) {
        let id = module.id.clone();
        if state
            .bounded(store.create_result(build_result(module, now)))
            .await?
        {
            report.archived.push(id);
        }
    }

    info!(
        scanned = report.scanned,
        archived = report.archived.len(),
        "backup sweep finished"
    );
    Ok(report)
}

/// Run auto-create, auto-lock and backup one after the other.
pub async fn run_all(
    state: &SharedState,
    now: SystemTime,
) -> Result<LifecycleReport, ServiceError> {
    let auto_create = auto_create(state, now).await?;
    let auto_lock = auto_lock(state, now).await?;
    let backup = backup(state, now).await?;
    Ok(LifecycleReport {
        auto_create,
        auto_lock,
        backup,
    })
}

fn matches_filter(value: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|wanted| value.eq_ignore_ascii_case(wanted.trim()))
}

/// Fixtures sorted by kickoff, each tagged with its window at `now`.
pub async fn list_fixtures(
    state: &SharedState,
    query: FixturesQuery,
    now: SystemTime,
) -> Result<Vec<FixtureView>, ServiceError> {
    let store = state.require_vote_store().await?;
    let mut fixtures = state.bounded(store.list_fixtures()).await?;
    fixtures.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then_with(|| a.id.cmp(&b.id)));

    let duration = state.config().match_duration;
    Ok(fixtures
        .into_iter()
        .filter(|fixture| matches_filter(&fixture.city, query.city.as_deref()))
        .filter(|fixture| matches_filter(&fixture.sport, query.sport.as_deref()))
        .filter_map(|fixture| {
            let window = classify(fixture.kickoff, now, duration);
            query
                .window
                .is_none_or(|wanted| wanted == window)
                .then(|| FixtureView::new(fixture, window))
        })
        .collect())
}

/// Map validator failures of an import row onto the service error.
pub(crate) fn invalid(err: validator::ValidationErrors) -> ServiceError {
    ServiceError::InvalidInput(format!("validation failed: {err}"))
}

/// Upsert a batch of fixtures; the whole batch is rejected if one row is invalid.
pub async fn import_fixtures(
    state: &SharedState,
    fixtures: Vec<FixtureInput>,
) -> Result<ImportResponse, ServiceError> {
    let entities = fixtures
        .into_iter()
        .map(|fixture| {
            fixture.validate().map_err(invalid)?;
            FixtureEntity::try_from(fixture)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let imported = entities.len();
    let store = state.require_vote_store().await?;
    state.bounded(store.save_fixtures(entities)).await?;
    info!(imported, "fixtures imported");
    Ok(ImportResponse { imported })
}

/// Upsert squads keyed by team id.
pub async fn import_squads(
    state: &SharedState,
    squads: Vec<SquadInput>,
) -> Result<ImportResponse, ServiceError> {
    for squad in &squads {
        squad.validate().map_err(invalid)?;
        validate_unique_ids(squad.players.iter().map(|p| p.id.as_str()))
            .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    }

    let store = state.require_vote_store().await?;
    let imported = squads.len();
    for squad in squads {
        state
            .bounded(store.save_squad(SquadEntity::from(squad)))
            .await?;
    }
    info!(imported, "squads imported");
    Ok(ImportResponse { imported })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::PlayerEntity,
            vote_store::{
                VoteStore,
                fixtures::{candidate, module},
            },
        },
        state::testing::{memory_state, memory_state_with},
    };

    fn at(value: OffsetDateTime) -> SystemTime {
        SystemTime::from(value)
    }

    fn fixture(id: &str, kickoff: SystemTime) -> FixtureEntity {
        FixtureEntity {
            id: id.into(),
            sport: "Rugby".into(),
            competition: "URC".into(),
            home_team_id: "leinster".into(),
            home_team: "Leinster".into(),
            away_team_id: "munster".into(),
            away_team: "Munster".into(),
            kickoff,
            city: "Dublin".into(),
            venue: "Aviva Stadium".into(),
        }
    }

    fn squad(id: &str, players: &[&str]) -> SquadEntity {
        SquadEntity {
            id: id.into(),
            name: id.to_uppercase(),
            city: "Dublin".into(),
            players: players
                .iter()
                .map(|player| PlayerEntity {
                    id: (*player).into(),
                    name: format!("Player {player}"),
                    position: None,
                    photo_url: None,
                })
                .collect(),
        }
    }

    #[test]
    fn classify_covers_the_three_windows() {
        let kickoff = at(datetime!(2024-03-02 17:00 UTC));
        let duration = Duration::from_secs(120 * 60);

        assert_eq!(
            classify(kickoff, kickoff - Duration::from_secs(1), duration),
            FixtureWindow::Upcoming
        );
        assert_eq!(classify(kickoff, kickoff, duration), FixtureWindow::Live);
        assert_eq!(
            classify(kickoff, kickoff + duration - Duration::from_secs(1), duration),
            FixtureWindow::Live
        );
        assert_eq!(
            classify(kickoff, kickoff + duration, duration),
            FixtureWindow::Finished
        );
    }

    #[test]
    fn unbounded_match_duration_stays_live() {
        let kickoff = at(datetime!(2024-03-02 17:00 UTC));
        assert_eq!(
            classify(kickoff, kickoff + Duration::from_secs(3600), Duration::MAX),
            FixtureWindow::Live
        );
    }

    #[test]
    fn day_bounds_start_at_utc_midnight() {
        let (start, end) = utc_day_bounds(at(datetime!(2024-03-02 17:42:10 UTC)));
        assert_eq!(start, at(datetime!(2024-03-02 00:00 UTC)));
        assert_eq!(end, at(datetime!(2024-03-03 00:00 UTC)));
    }

    #[tokio::test]
    async fn auto_create_opens_one_module_per_known_squad() {
        let (state, store) = memory_state().await;
        let now = at(datetime!(2024-03-02 09:00 UTC));
        store
            .save_fixtures(vec![
                fixture("m1", at(datetime!(2024-03-02 17:00 UTC))),
                fixture("m2", at(datetime!(2024-03-03 17:00 UTC))),
            ])
            .await
            .unwrap();
        store.save_squad(squad("leinster", &["p1", "p2"])).await.unwrap();

        let report = auto_create(&state, now).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.created, vec!["leinster_m1".to_string()]);
        assert_eq!(report.skipped, 1);

        let created = store.find_module("leinster_m1".into()).await.unwrap().unwrap();
        assert_eq!(created.title, AUTO_MODULE_TITLE);
        assert_eq!(created.opponent, "Munster");
        assert_eq!(created.total_votes(), 0);
        assert_eq!(created.candidates.len(), 2);
        assert_eq!(created.expires_at, at(datetime!(2024-03-03 17:00 UTC)));
    }

    #[tokio::test]
    async fn auto_create_skips_sides_whose_window_overflows() {
        let config = AppConfig {
            vote_window: Duration::MAX,
            ..AppConfig::default()
        };
        let (state, store) = memory_state_with(config).await;
        store
            .save_fixtures(vec![fixture("m1", at(datetime!(2024-03-02 17:00 UTC)))])
            .await
            .unwrap();
        store.save_squad(squad("leinster", &["p1"])).await.unwrap();

        let report = auto_create(&state, at(datetime!(2024-03-02 09:00 UTC)))
            .await
            .unwrap();
        assert!(report.created.is_empty());
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn auto_create_rerun_keeps_votes() {
        let (state, store) = memory_state().await;
        let now = at(datetime!(2024-03-02 09:00 UTC));
        store
            .save_fixtures(vec![fixture("m1", at(datetime!(2024-03-02 17:00 UTC)))])
            .await
            .unwrap();
        store.save_squad(squad("leinster", &["p1"])).await.unwrap();
        store.save_squad(squad("munster", &["q1"])).await.unwrap();

        let first = auto_create(&state, now).await.unwrap();
        assert_eq!(first.created.len(), 2);

        crate::services::vote_service::cast_vote(
            &state,
            "leinster_m1".into(),
            "u1".into(),
            crate::dto::vote::CastVoteRequest {
                candidate_id: "p1".into(),
            },
        )
        .await
        .unwrap();

        let second = auto_create(&state, now).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped, 2);

        let module = store.find_module("leinster_m1".into()).await.unwrap().unwrap();
        assert_eq!(module.total_votes(), 1);
    }

    #[tokio::test]
    async fn auto_lock_only_touches_expired_modules() {
        let (state, store) = memory_state().await;
        let expired = module("leinster_m1", vec![candidate("a", 1)]);
        let open = VoteModuleEntity {
            id: "leinster_m2".into(),
            expires_at: expired.expires_at + Duration::from_secs(3600),
            ..expired.clone()
        };
        let now = expired.expires_at + Duration::from_secs(1);
        store.create_module(expired).await.unwrap();
        store.create_module(open).await.unwrap();

        let report = auto_lock(&state, now).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.locked, vec!["leinster_m1".to_string()]);

        let rerun = auto_lock(&state, now).await.unwrap();
        assert!(rerun.locked.is_empty());
        assert!(!store.find_module("leinster_m2".into()).await.unwrap().unwrap().locked);
    }

    #[tokio::test]
    async fn module_at_exact_expiry_stays_open() {
        let (state, store) = memory_state().await;
        let m = module("leinster_m1", vec![candidate("a", 0)]);
        let now = m.expires_at;
        store.create_module(m).await.unwrap();

        assert!(auto_lock(&state, now).await.unwrap().locked.is_empty());
    }

    #[tokio::test]
    async fn backup_archives_locked_modules_once() {
        let (state, store) = memory_state().await;
        store
            .create_module(module(
                "leinster_m1",
                vec![candidate("a", 2), candidate("b", 7), candidate("c", 7)],
            ))
            .await
            .unwrap();
        store
            .create_module(module("leinster_m2", vec![candidate("a", 0)]))
            .await
            .unwrap();
        store.lock_module("leinster_m1".into()).await.unwrap();

        let now = SystemTime::now();
        let report = backup(&state, now).await.unwrap();
        assert_eq!(report.archived, vec!["leinster_m1".to_string()]);

        let result = store.find_result("leinster_m1".into()).await.unwrap().unwrap();
        let order: Vec<_> = result.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert_eq!(result.total_votes, 16);
        assert_eq!(result.winner_id.as_deref(), Some("b"));

        assert!(backup(&state, now).await.unwrap().archived.is_empty());
    }

    #[test]
    fn result_without_votes_has_no_winner() {
        let result = build_result(
            module("leinster_m1", vec![candidate("a", 0), candidate("b", 0)]),
            SystemTime::now(),
        );
        assert_eq!(result.winner_id, None);
        assert_eq!(result.total_votes, 0);
    }

    #[tokio::test]
    async fn run_all_creates_locks_and_archives_in_order() {
        let (state, store) = memory_state().await;
        let kickoff = at(datetime!(2024-03-02 00:30 UTC));
        store.save_fixtures(vec![fixture("m1", kickoff)]).await.unwrap();
        store.save_squad(squad("leinster", &["p1"])).await.unwrap();

        let first = run_all(&state, at(datetime!(2024-03-02 10:00 UTC))).await.unwrap();
        assert_eq!(first.auto_create.created.len(), 1);
        assert!(first.auto_lock.locked.is_empty());
        assert!(first.backup.archived.is_empty());

        let after_window = at(datetime!(2024-03-03 01:00 UTC));
        let second = run_all(&state, after_window).await.unwrap();
        assert!(second.auto_create.created.is_empty());
        assert_eq!(second.auto_lock.locked, vec!["leinster_m1".to_string()]);
        assert_eq!(second.backup.archived, vec!["leinster_m1".to_string()]);
    }

    #[tokio::test]
    async fn fixtures_filter_ignores_case_and_tags_windows() {
        let (state, store) = memory_state().await;
        let now = at(datetime!(2024-03-02 18:00 UTC));
        let mut cork = fixture("m3", at(datetime!(2024-03-09 15:00 UTC)));
        cork.city = "Cork".into();
        cork.sport = "Football".into();
        store
            .save_fixtures(vec![
                fixture("m2", at(datetime!(2024-03-02 17:00 UTC))),
                fixture("m1", at(datetime!(2024-02-24 17:00 UTC))),
                cork,
            ])
            .await
            .unwrap();

        let all = list_fixtures(&state, FixturesQuery::default(), now)
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
        assert_eq!(all[0].window, FixtureWindow::Finished);
        assert_eq!(all[1].window, FixtureWindow::Live);
        assert_eq!(all[2].window, FixtureWindow::Upcoming);

        let dublin_rugby = list_fixtures(
            &state,
            FixturesQuery {
                city: Some("dUBLIN".into()),
                sport: Some("rugby".into()),
                window: Some(FixtureWindow::Live),
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(dublin_rugby.len(), 1);
        assert_eq!(dublin_rugby[0].id, "m2");
    }

    #[tokio::test]
    async fn invalid_fixture_rejects_the_batch() {
        let (state, store) = memory_state().await;
        let good = FixtureInput {
            id: "m1".into(),
            sport: "rugby".into(),
            competition: String::new(),
            home_team_id: "leinster".into(),
            home_team: "Leinster".into(),
            away_team_id: "munster".into(),
            away_team: "Munster".into(),
            kickoff: "2024-03-02T17:00:00Z".into(),
            city: "Dublin".into(),
            venue: String::new(),
        };
        let bad = FixtureInput {
            id: "m2".into(),
            kickoff: "saturday".into(),
            ..good.clone()
        };

        let result = import_fixtures(&state, vec![good.clone(), bad]).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert!(store.list_fixtures().await.unwrap().is_empty());

        let ok = import_fixtures(&state, vec![good]).await.unwrap();
        assert_eq!(ok.imported, 1);
    }

    #[tokio::test]
    async fn squad_with_duplicate_players_is_rejected() {
        let (state, _) = memory_state().await;
        let player = crate::dto::lifecycle::PlayerInput {
            id: "p1".into(),
            name: "Player".into(),
            position: None,
            photo_url: None,
        };
        let squad = SquadInput {
            id: "leinster".into(),
            name: "Leinster".into(),
            city: "Dublin".into(),
            players: vec![player.clone(), player],
        };
        assert!(matches!(
            import_squads(&state, vec![squad]).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
