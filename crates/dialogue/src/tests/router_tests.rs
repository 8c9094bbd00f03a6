use super::*;
use crate::{
    choice::Choice,
    state::DialogState,
    test_support::{admin_storage, name, router, FlakyStore, ADMIN, OTHER_ADMIN, USER},
};
use storage::{PanelRef, Storage};

async fn say(router: &BotRouter, identity: Identity, text: &str) -> Vec<OutboundAction> {
    router.dispatch(InboundEvent::text(identity, text)).await
}

async fn press(router: &BotRouter, identity: Identity, token: &str) -> Vec<OutboundAction> {
    router.dispatch(InboundEvent::selection(identity, token)).await
}

fn only_text(actions: &[OutboundAction]) -> &str {
    assert_eq!(actions.len(), 1, "{actions:?}");
    &actions[0].text
}

async fn seeded() -> (Arc<Storage>, BotRouter) {
    let storage = Arc::new(admin_storage().await);
    storage.add_panel(&name("start"), Some("Hello")).await.expect("start");
    storage
        .add_subcommand(PanelRef::Name(&name("start")), &name("help"), "Commands:")
        .await
        .expect("help");
    storage
        .add_subcommand(PanelRef::Name(&name("start")), &name("faq"), "Read the pins")
        .await
        .expect("faq");
    storage.add_panel(&name("menu"), None).await.expect("menu");
    storage
        .add_subcommand(PanelRef::Name(&name("menu")), &name("a"), "Resp A")
        .await
        .expect("a");
    let router = router(storage.clone());
    (storage, router)
}

#[tokio::test]
async fn start_greets_and_lists_its_children() {
    let (_storage, router) = seeded().await;
    let actions = router
        .dispatch(InboundEvent::text(USER, "/start").with_display_name("Ada"))
        .await;

    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].text, "Hello, Ada");
    assert_eq!(actions[1].text, "Here is the list of commands that I can do:");
    let tokens: Vec<&str> = actions[1]
        .menu
        .iter()
        .flatten()
        .map(|b| b.token.as_str())
        .collect();
    assert_eq!(tokens, ["help", "faq"]);
    assert!(actions.iter().all(|a| a.identity == USER));
}

#[tokio::test]
async fn help_lists_catalog_sorted_without_start_and_help() {
    let (_storage, router) = seeded().await;
    let actions = say(&router, USER, "/help").await;
    assert_eq!(only_text(&actions), "Commands:\n/a\n/faq\n/menu");

    // The help button behaves the same.
    let pressed = press(&router, USER, "help").await;
    assert_eq!(pressed, actions);
}

#[tokio::test]
async fn panel_lookup_shows_menu_of_children() {
    let (_storage, router) = seeded().await;
    let actions = say(&router, USER, "/menu").await;
    assert_eq!(only_text(&actions), "Choose:");
    assert_eq!(
        actions[0].menu,
        Some(vec![MenuButton::new("a", "a")])
    );

    let child = press(&router, USER, "a").await;
    assert_eq!(only_text(&child), "Resp A");
    assert!(child[0].menu.is_none());
}

#[tokio::test]
async fn unknown_command_and_free_text() {
    let (_storage, router) = seeded().await;
    assert_eq!(
        only_text(&say(&router, USER, "/ghost").await),
        "Sorry, I don't have a response for the /ghost command."
    );
    assert_eq!(only_text(&say(&router, USER, "hello?").await), NOT_UNDERSTOOD);
}

#[tokio::test]
async fn is_admin_answers_anyone() {
    let (_storage, router) = seeded().await;
    assert_eq!(
        only_text(&say(&router, ADMIN, "/is_admin").await),
        "Yes, you are an admin."
    );
    assert_eq!(
        only_text(&say(&router, USER, "/is_admin").await),
        "No, you are not an admin."
    );
}

#[tokio::test]
async fn non_admin_cannot_start_flows() {
    let (_storage, router) = seeded().await;
    let actions = say(&router, USER, "/add_command").await;
    assert_eq!(
        only_text(&actions),
        "Sorry, I don't have a response for the /add_command command."
    );
    assert!(!router.sessions().contains(USER));

    let actions = press(&router, USER, Choice::AddCommand.token()).await;
    assert_eq!(only_text(&actions), ADMINS_ONLY);
    assert!(!router.sessions().contains(USER));
}

#[tokio::test]
async fn admin_selection_while_idle_changes_nothing() {
    let (storage, router) = seeded().await;
    let actions = press(&router, ADMIN, Choice::AddPanel.token()).await;
    assert!(only_text(&actions).starts_with("Nothing is in progress."));
    assert_eq!(router.sessions().peek(ADMIN), Some(DialogState::Idle));
    assert_eq!(storage.list_all().await.expect("list").len(), 5);
}

#[tokio::test]
async fn admin_panel_flow_through_router() {
    let (storage, router) = seeded().await;
    let actions = say(&router, ADMIN, "/add_command").await;
    let menu = actions[0].menu.clone().expect("menu");
    assert_eq!(menu.len(), 2);

    press(&router, ADMIN, &menu[1].token).await;
    say(&router, ADMIN, "/drinks Pick a drink").await;
    say(&router, ADMIN, "/tea Green tea").await;
    say(&router, ADMIN, "/coffee Espresso").await;
    let done = say(&router, ADMIN, "/exit").await;
    assert_eq!(only_text(&done), "Exited panel editing mode.");

    assert_eq!(
        storage.children_of(&name("drinks")).await.expect("children"),
        vec![name("tea"), name("coffee")]
    );
    // Once idle, the admin's commands are lookups again.
    assert_eq!(only_text(&say(&router, ADMIN, "/tea").await), "Green tea");
}

#[tokio::test]
async fn two_admins_keep_separate_contexts() {
    let (storage, router) = seeded().await;

    say(&router, ADMIN, "/add_command").await;
    say(&router, OTHER_ADMIN, "/add_command").await;
    press(&router, ADMIN, Choice::AddPanel.token()).await;
    press(&router, OTHER_ADMIN, Choice::AddPanel.token()).await;
    say(&router, ADMIN, "/left").await;
    say(&router, OTHER_ADMIN, "/right").await;
    say(&router, OTHER_ADMIN, "/r1 R1").await;
    say(&router, ADMIN, "/l1 L1").await;
    say(&router, ADMIN, "/exit").await;
    say(&router, OTHER_ADMIN, "/r2 R2").await;

    assert_eq!(
        storage.children_of(&name("left")).await.expect("left"),
        vec![name("l1")]
    );
    assert_eq!(
        storage.children_of(&name("right")).await.expect("right"),
        vec![name("r1"), name("r2")]
    );
    assert_eq!(router.sessions().peek(ADMIN), Some(DialogState::Idle));
    assert_eq!(
        router.sessions().peek(OTHER_ADMIN),
        Some(DialogState::AddSubcommand)
    );
}

#[tokio::test]
async fn revoked_admin_loses_the_flow() {
    let (storage, router) = seeded().await;
    say(&router, ADMIN, "/remove_command").await;
    storage.remove_admin(ADMIN).await.expect("revoke");

    let actions = say(&router, ADMIN, "/menu").await;
    assert_eq!(only_text(&actions), "Choose:");
    assert!(storage.exists(&name("menu")).await.expect("menu"));
    assert_eq!(router.sessions().peek(ADMIN), Some(DialogState::Idle));
}

#[tokio::test]
async fn store_outage_is_answered_not_propagated() {
    let flaky = Arc::new(FlakyStore::new(admin_storage().await));
    let router = router(flaky.clone());

    say(&router, ADMIN, "/remove_command").await;
    flaky.set_down(true);
    let actions = say(&router, ADMIN, "/menu").await;
    assert_eq!(only_text(&actions), GENERIC_FAILURE);
    assert_eq!(actions[0].identity, ADMIN);

    flaky.set_down(false);
    assert_eq!(
        router.sessions().peek(ADMIN),
        Some(DialogState::AwaitingRemoveTarget)
    );
}

#[tokio::test]
async fn catalog_button_never_feeds_an_admin_flow() {
    let (storage, router) = seeded().await;
    say(&router, ADMIN, "/remove_command").await;

    let actions = press(&router, ADMIN, "faq").await;
    assert_eq!(only_text(&actions), "Read the pins");
    assert!(storage.exists(&name("faq")).await.expect("faq"));
    assert_eq!(
        router.sessions().peek(ADMIN),
        Some(DialogState::AwaitingRemoveTarget)
    );

    // Typing the name still completes the flow.
    say(&router, ADMIN, "/faq").await;
    assert!(!storage.exists(&name("faq")).await.expect("faq"));
}
