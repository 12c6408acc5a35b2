//! Data Access Layer tests through a started client.

use std::sync::Arc;

use wall_client::{queries, Feed, Pager, Route, VoteMap, VoteOutcome, WallClient, WallService};
use wall_core::{Content, Homework, MessageId, NumericId, Principal, Profile, Vote};
use wall_test_utils::assertions::{
    assert_not_found, assert_remote_failure, assert_unauthenticated, assert_validation_error,
};
use wall_test_utils::fixtures::{
    backend_with_student, homework, local_config, long_text, other_student, profile, student,
};
use wall_test_utils::{ops, InMemoryBackend, InMemoryConnector, ScriptedIdentityProvider};

async fn start_as(principal: Principal, backend: &Arc<InMemoryBackend>) -> WallClient {
    let provider = ScriptedIdentityProvider::signed_in(principal);
    let connector = Arc::new(InMemoryConnector::new(Arc::clone(backend)));
    let client = WallClient::start(&local_config(), provider, connector).await;
    backend.reset_calls();
    client
}

fn seed_messages(backend: &InMemoryBackend, count: usize) {
    for n in 0..count {
        backend.seed_message(
            &other_student(),
            Content::text(format!("Seeded message number {}", n)),
        );
    }
}

#[tokio::test]
async fn test_without_handle_nothing_reaches_the_service() {
    let backend = backend_with_student();
    backend.fail(ops::AUTHENTICATE, "bad delegation");
    let client = start_as(student(), &backend).await;
    let data = client.data();

    assert_unauthenticated(&data.recent_page(1).await);
    assert_unauthenticated(&data.list_own_votes().await);
    assert_unauthenticated(&data.post_message(long_text()).await);
    assert_unauthenticated(&data.upvote(MessageId::new(1)).await);
    assert_unauthenticated(&data.update_profile(profile()).await);
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_short_message_fails_before_any_call() {
    let backend = backend_with_student();
    let client = start_as(student(), &backend).await;

    let result = client.data().post_message(Content::text("short")).await;
    assert_validation_error(&result);
    let id = backend.seed_message(&student(), long_text());
    let result = client.data().edit_message(id, Content::text("tiny")).await;
    assert_validation_error(&result);
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_fresh_page_is_served_from_cache() {
    let backend = backend_with_student();
    seed_messages(&backend, 3);
    let client = start_as(student(), &backend).await;

    let first = client.data().recent_page(1).await.unwrap();
    let second = client.data().recent_page(1).await.unwrap();

    assert!(first.was_cache_miss());
    assert!(second.was_cache_hit());
    assert_eq!(second.value().len(), 3);
    assert_eq!(backend.calls(ops::GET_RECENT_PAGE), 1);
}

#[tokio::test]
async fn test_message_write_invalidates_every_message_read() {
    let backend = backend_with_student();
    seed_messages(&backend, 10);
    let client = start_as(student(), &backend).await;
    let data = client.data();

    assert_eq!(*data.page_count().await.unwrap().value(), 1);
    let before = data.recent_page(1).await.unwrap().into_value();
    data.ranked_page(1).await.unwrap();

    let posted = data.post_message(long_text()).await.unwrap();

    let count = data.page_count().await.unwrap();
    assert!(count.was_cache_miss());
    assert_eq!(*count.value(), 2);
    let after = data.recent_page(1).await.unwrap();
    assert!(after.was_cache_miss());
    assert_ne!(after.value(), &before);
    assert_eq!(after.value()[0].id, posted);
    assert!(data.ranked_page(1).await.unwrap().was_cache_miss());
}

#[tokio::test]
async fn test_upvote_matching_cached_vote_is_a_no_op() {
    let backend = backend_with_student();
    let id = backend.seed_message(&other_student(), long_text());
    backend.handle(student()).upvote(id).await.unwrap();
    let client = start_as(student(), &backend).await;
    let data = client.data();

    data.list_own_votes().await.unwrap();
    backend.reset_calls();

    assert_eq!(data.upvote(id).await, Ok(VoteOutcome::Unchanged));
    assert_eq!(backend.total_calls(), 0);

    let votes = data.list_own_votes().await.unwrap();
    assert!(votes.was_cache_hit());
    assert_eq!(votes.value().get(&id), Some(&Vote::Upvote));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_changing_a_vote_reaches_the_service_and_invalidates() {
    let backend = backend_with_student();
    let id = backend.seed_message(&other_student(), long_text());
    backend.handle(student()).upvote(id).await.unwrap();
    let client = start_as(student(), &backend).await;
    let data = client.data();

    data.list_own_votes().await.unwrap();
    assert_eq!(data.downvote(id).await, Ok(VoteOutcome::Recorded));
    assert_eq!(backend.calls(ops::DOWNVOTE), 1);
    assert_eq!(client.cache().peek::<VoteMap>(&queries::votes()), None);

    let votes = data.list_own_votes().await.unwrap();
    assert!(votes.was_cache_miss());
    assert_eq!(votes.value().get(&id), Some(&Vote::Downvote));
    assert_eq!(data.message(id).await.unwrap().value().vote, -1);
}

#[tokio::test]
async fn test_vote_without_cached_votes_is_sent() {
    let backend = backend_with_student();
    let id = backend.seed_message(&other_student(), long_text());
    let client = start_as(student(), &backend).await;

    assert_eq!(client.data().upvote(id).await, Ok(VoteOutcome::Recorded));
    assert_eq!(backend.vote_of(&student(), id), Some(Vote::Upvote));
}

#[tokio::test]
async fn test_delete_redirects_to_messages_and_invalidates_votes() {
    let backend = backend_with_student();
    let id = backend.seed_message(&student(), long_text());
    let client = start_as(student(), &backend).await;
    let data = client.data();
    data.upvote(id).await.unwrap();
    data.list_own_votes().await.unwrap();

    assert_eq!(data.delete_message(id).await, Ok(Route::Messages));

    let votes = data.list_own_votes().await.unwrap();
    assert!(votes.was_cache_miss());
    assert!(votes.value().is_empty());
    assert_not_found(&data.message(id).await, "message");
}

#[tokio::test]
async fn test_remote_failures_surface_unchanged_without_retry() {
    let backend = backend_with_student();
    let id = backend.seed_message(&other_student(), long_text());
    let client = start_as(student(), &backend).await;
    let data = client.data();

    let result = data.delete_message(id).await;
    assert_remote_failure(&result, "You are not the creator of this message");

    backend.fail(ops::GET_RECENT_PAGE, "replica unavailable");
    assert_remote_failure(&data.recent_page(1).await, "replica unavailable");
    assert_eq!(backend.calls(ops::GET_RECENT_PAGE), 1);
}

#[tokio::test]
async fn test_message_failures_read_as_not_found() {
    let backend = backend_with_student();
    let id = backend.seed_message(&other_student(), long_text());
    let client = start_as(student(), &backend).await;

    assert_not_found(&client.data().message(MessageId::new(999)).await, "message");
    backend.fail(ops::GET_MESSAGE, "replica unavailable");
    assert_not_found(&client.data().message(id).await, "message");
}

#[tokio::test]
async fn test_profile_lookup_only_with_a_principal() {
    let backend = backend_with_student();
    let client = start_as(student(), &backend).await;
    let data = client.data();

    assert!(data.profile_by_id(None).await.unwrap().is_none());
    assert_eq!(backend.total_calls(), 0);

    let found = data.profile_by_id(Some(&student())).await.unwrap().unwrap();
    assert_eq!(found.value(), &profile());
    assert_remote_failure(
        &data.profile_by_id(Some(&other_student())).await,
        "Profile not found",
    );
}

#[tokio::test]
async fn test_homework_diary_round_trip() {
    let backend = backend_with_student();
    let client = start_as(student(), &backend).await;
    let data = client.data();

    let too_short = Homework::new("Maths", "p. 12", homework().due_date);
    assert_validation_error(&data.add_homework(too_short).await);
    assert_eq!(backend.total_calls(), 0);

    assert!(data.list_homework().await.unwrap().value().is_empty());
    let id = data.add_homework(homework()).await.unwrap();
    let listed = data.list_homework().await.unwrap();
    assert!(listed.was_cache_miss());
    assert_eq!(listed.value().len(), 1);

    data.toggle_homework_completed(id).await.unwrap();
    let listed = data.list_homework().await.unwrap();
    assert!(listed.value()[0].1.completed);

    data.delete_homework(id).await.unwrap();
    assert!(data.list_homework().await.unwrap().value().is_empty());
}

#[tokio::test]
async fn test_profile_update_then_refresh() {
    let backend = backend_with_student();
    let client = start_as(student(), &backend).await;

    let invalid = Profile {
        email: "not-an-email".to_string(),
        ..profile()
    };
    assert_validation_error(&client.data().update_profile(invalid).await);

    let updated = Profile {
        team: None,
        ..profile()
    };
    client.data().update_profile(updated.clone()).await.unwrap();
    assert_eq!(client.snapshot().profile(), Some(&profile()));

    client.refresh_profile().await.unwrap();
    assert_eq!(client.snapshot().profile(), Some(&updated));
}

#[tokio::test]
async fn test_page_snapshot_keeps_previous_page_while_loading() {
    let backend = backend_with_student();
    seed_messages(&backend, 15);
    let client = start_as(student(), &backend).await;
    let data = client.data();

    assert!(data.recent_page_snapshot(1).is_none());
    let first = data.recent_page(1).await.unwrap().into_value();

    let placeholder = data.recent_page_snapshot(2).unwrap();
    assert!(placeholder.is_placeholder);
    assert_eq!(placeholder.value, first);
    assert!(data.ranked_page_snapshot(2).is_none());

    let second = data.recent_page(2).await.unwrap().into_value();
    assert_eq!(second.len(), 5);
    let loaded = data.recent_page_snapshot(2).unwrap();
    assert!(!loaded.is_placeholder);
    assert_eq!(loaded.value, second);
}

#[tokio::test]
async fn test_pager_selects_feed() {
    let backend = backend_with_student();
    seed_messages(&backend, 12);
    let id = backend.seed_message(&other_student(), long_text());
    let client = start_as(student(), &backend).await;
    client.data().upvote(MessageId::new(1)).await.unwrap();

    let mut pager = Pager::new(Feed::Ranked);
    pager.set_page_count(*client.data().page_count().await.unwrap().value());
    assert_eq!(pager.page_count(), 2);

    let ranked = client.data().current_page(&pager).await.unwrap();
    assert_eq!(ranked.value()[0].id, MessageId::new(1));

    pager.switch_feed(Feed::Recent);
    let recent = client.data().current_page(&pager).await.unwrap();
    assert_eq!(recent.value()[0].id, id);
}

#[tokio::test]
async fn test_identity_change_clears_cache() {
    let backend = backend_with_student();
    let provider = ScriptedIdentityProvider::signed_in(student());
    let connector = Arc::new(InMemoryConnector::new(Arc::clone(&backend)));
    let client = WallClient::start(&local_config(), provider.clone(), connector).await;

    client.data().list_own_votes().await.unwrap();
    assert!(!client.cache().is_empty());

    client.logout().await;
    assert!(client.cache().is_empty());
    assert!(client.snapshot().is_anonymous());

    client.data().recent_page(1).await.unwrap();
    provider.push_login(other_student());
    client.login().await.unwrap();
    assert!(client.cache().is_empty());
    assert_eq!(client.snapshot().caller_id(), Some(&other_student()));
}

#[tokio::test]
async fn test_session_transitions_clear_cache_without_client_wrapper() {
    let backend = backend_with_student();
    let provider = ScriptedIdentityProvider::signed_in(student());
    let connector = Arc::new(InMemoryConnector::new(Arc::clone(&backend)));
    let client = WallClient::start(&local_config(), provider.clone(), connector).await;

    client.data().recent_page(1).await.unwrap();
    client.session().logout().await;
    assert!(client.cache().is_empty());

    client.data().recent_page(1).await.unwrap();
    provider.push_login(other_student());
    client.session().login().await.unwrap();
    assert!(client.cache().is_empty());

    client.data().recent_page(1).await.unwrap();
    assert_eq!(client.session().login().await, Ok(wall_client::LoginOutcome::Cancelled));
    assert!(!client.cache().is_empty());
}

#[tokio::test]
async fn test_read_in_flight_across_logout_is_not_cached() {
    let backend = backend_with_student();
    let id = backend.seed_message(&other_student(), long_text());
    backend.handle(student()).upvote(id).await.unwrap();
    let client = start_as(student(), &backend).await;
    client.data().recent_page(1).await.unwrap();

    let release = backend.hold(ops::LIST_OWN_VOTES);
    let (read, ()) = tokio::join!(client.data().list_own_votes(), async {
        tokio::task::yield_now().await;
        client.session().logout().await;
        assert!(client.snapshot().is_anonymous());
        assert!(client.cache().is_empty());
        release.send(()).unwrap();
    });

    assert_eq!(read.unwrap().value().get(&id), Some(&Vote::Upvote));
    assert_eq!(client.cache().peek::<VoteMap>(&queries::votes()), None);
    assert!(client.cache().is_empty());

    let votes = client.data().list_own_votes().await.unwrap();
    assert!(votes.was_cache_miss());
    assert!(votes.value().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_collector() {
    let backend = backend_with_student();
    let mut client = start_as(student(), &backend).await;
    assert!(client.is_collecting());

    client.data().list_own_votes().await.unwrap();
    client.shutdown();
    assert!(!client.is_collecting());
    assert!(client.cache().is_empty());
}
