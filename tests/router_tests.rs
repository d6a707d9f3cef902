//! DataRouter navigation, revalidation, history and fetchers.

mod common;

use common::*;
use data_router::*;
use http::{Method, StatusCode};
use serde_json::json;
use std::time::Duration;

fn router(routes: Vec<Route>) -> DataRouter {
    DataRouter::new(routes, RouterConfig::default()).unwrap()
}

#[tokio::test]
async fn test_initialize_commits_loader_data() {
    init_logging();
    let router = router(vec![Route::new("root", "/")
        .loader(data_loader(json!({ "user": "ada" })))
        .child(Route::new("team", "teams/:team").loader(params_loader()))]);

    assert!(!router.state().initialized);
    let result = router.initialize("/teams/core").await;
    assert!(result.is_success());

    let state = router.state();
    assert!(state.initialized);
    assert!(state.navigation.is_idle());
    assert_eq!(state.location.pathname, "/teams/core");
    assert_eq!(state.loader_data("root"), Some(&json!({ "user": "ada" })));
    assert_eq!(state.loader_data("team"), Some(&json!({ "team": "core" })));
    assert_eq!(state.status, StatusCode::OK);
    assert!(!router.can_go_back());
}

#[tokio::test]
async fn test_navigation_revalidates_only_changed_routes() {
    let root = CallCounter::new();
    let item = CallCounter::new();
    let counter = item.clone();
    let router = router(vec![Route::new("root", "/")
        .loader(counting_loader(&root, json!("root")))
        .child(Route::new("item", "items/:id").loader(loader_fn(move |args: LoaderArgs| {
            counter.hit();
            let id = args.params.get("id").cloned().unwrap_or_default();
            async move { Ok(RouteResponse::data(json!(id))) }
        })))]);

    router.initialize("/items/1").await;
    router.navigate("/items/2").await;

    assert_eq!(root.count(), 1);
    assert_eq!(item.count(), 2);
    let state = router.state();
    assert_eq!(state.loader_data("root"), Some(&json!("root")));
    assert_eq!(state.loader_data("item"), Some(&json!("2")));
    assert!(router.can_go_back());
}

#[tokio::test]
async fn test_search_change_reloads_everything() {
    let root = CallCounter::new();
    let list = CallCounter::new();
    let router = router(vec![Route::new("root", "/")
        .loader(counting_loader(&root, json!(null)))
        .child(Route::new("list", "list").loader(counting_loader(&list, json!([]))))]);

    router.initialize("/list").await;
    router.navigate("/list?page=2").await;

    assert_eq!((root.count(), list.count()), (2, 2));
    assert_eq!(router.state().location.search, "?page=2");
}

#[tokio::test]
async fn test_submission_revalidates_and_records_action_data() {
    let root = CallCounter::new();
    let router = router(vec![Route::new("root", "/")
        .loader(counting_loader(&root, json!(null)))
        .child(
            Route::new("todos", "todos")
                .loader(data_loader(json!(["milk"])))
                .action(action_fn(|args: ActionArgs| async move {
                    let title = args
                        .request
                        .form
                        .and_then(|form| form.get("title").cloned())
                        .unwrap_or_default();
                    Ok(RouteResponse::data(json!({ "added": title })))
                })),
        )]);

    router.initialize("/todos").await;
    let result = router
        .submit("/todos", Method::POST, form(&[("title", "eggs")]))
        .await;
    assert!(result.is_success());

    let state = router.state();
    assert_eq!(root.count(), 2);
    assert_eq!(
        state.action_data.as_ref().unwrap().get("todos"),
        Some(&json!({ "added": "eggs" }))
    );
    assert_eq!(state.loader_data("todos"), Some(&json!(["milk"])));
}

#[tokio::test]
async fn test_should_revalidate_can_opt_out() {
    let sidebar = CallCounter::new();
    let router = router(vec![Route::new("root", "/")
        .loader(counting_loader(&sidebar, json!("sidebar")))
        .should_revalidate(should_revalidate_fn(|args| args.form_method.is_none()))
        .child(Route::new("page", "page").action(action_fn(|_| async {
            Ok(RouteResponse::empty())
        })))]);

    router.initialize("/page").await;
    router.submit("/page", Method::POST, FormData::new()).await;

    assert_eq!(sidebar.count(), 1);
    assert_eq!(router.state().loader_data("root"), Some(&json!("sidebar")));
}

#[tokio::test]
async fn test_submission_without_action_is_405() {
    let router = router(vec![Route::new("root", "/")
        .error_boundary()
        .child(Route::new("page", "page"))]);

    router.initialize("/page").await;
    router.submit("/page", Method::POST, FormData::new()).await;

    let state = router.state();
    assert_eq!(state.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(state.error("root").unwrap().status(), 405);
}

#[tokio::test]
async fn test_unmatched_path_commits_404_at_root() {
    let router = router(vec![Route::new("root", "/")
        .error_boundary()
        .loader(data_loader(json!("root")))
        .child(Route::new("about", "about"))]);

    let result = router.initialize("/nope").await;
    assert!(result.is_not_found());

    let state = router.state();
    assert_eq!(state.status, StatusCode::NOT_FOUND);
    assert_eq!(state.matches.len(), 1);
    let error = state.error("root").unwrap();
    assert_eq!(error.status(), 404);
    assert!(state.loader_data.is_empty());
}

#[tokio::test]
async fn test_loader_error_prunes_data_below_boundary() {
    let router = router(vec![Route::new("root", "/")
        .error_boundary()
        .loader(data_loader(json!("root")))
        .child(
            Route::new("dash", "dash")
                .loader(loader_fn(|_| async { Err(RouteThrow::error("boom")) }))
                .child(Route::new("widget", "widget").loader(data_loader(json!("w")))),
        )]);

    router.initialize("/dash/widget").await;

    let state = router.state();
    assert_eq!(state.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.error("root").unwrap().message(), "boom");
    assert_eq!(state.loader_data("root"), Some(&json!("root")));
    assert!(state.loader_data("widget").is_none());
}

#[tokio::test]
async fn test_redirect_commits_final_location() {
    let router = router(vec![Route::new("root", "/").children(vec![
        Route::new("old", "old").loader(loader_fn(|_| async {
            Ok(RouteResponse::redirect("/new?from=old"))
        })),
        Route::new("new", "new").loader(data_loader(json!("new"))),
    ])]);

    router.initialize("/").await;
    let result = router.navigate("/old").await;

    assert!(result.is_success());
    let state = router.state();
    assert_eq!(state.location.href(), "/new?from=old");
    assert_eq!(state.loader_data("new"), Some(&json!("new")));
    assert_eq!(router.current_path(), "/new?from=old");
}

#[tokio::test]
async fn test_redirect_revalidates_against_the_final_location() {
    let root = CallCounter::new();
    let router = router(vec![Route::new("root", "/")
        .loader(counting_loader(&root, json!("root")))
        .child(Route::new("item", "list/:id").loader(loader_fn(|args: LoaderArgs| async move {
            if args.params.get("id").map(String::as_str) == Some("old") {
                Ok(RouteResponse::redirect("/list/new?sort=1"))
            } else {
                Ok(RouteResponse::data(json!(args.params.get("id"))))
            }
        })))]);

    router.initialize("/list/a").await;
    let result = router.navigate("/list/old").await;

    assert!(result.is_success());
    let state = router.state();
    assert_eq!(state.location.href(), "/list/new?sort=1");
    assert_eq!(state.loader_data("item"), Some(&json!("new")));
    // The search changed between the committed and the final URL.
    assert_eq!(root.count(), 2);
}

#[tokio::test]
async fn test_external_redirect_leaves_state_untouched() {
    let router = router(vec![Route::new("root", "/")
        .loader(data_loader(json!("root")))
        .child(Route::new("out", "out").loader(loader_fn(|_| async {
            Ok(RouteResponse::redirect("https://example.com/"))
        })))]);

    router.initialize("/").await;
    let result = router.navigate("/out").await;

    assert_eq!(result.external_location(), Some("https://example.com/"));
    assert_eq!(router.state().location.pathname, "/");
}

#[tokio::test]
async fn test_newer_navigation_supersedes_older() {
    let router = router(vec![Route::new("root", "/").children(vec![
        Route::new("slow", "slow").loader(loader_fn(|_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RouteResponse::data(json!("slow")))
        })),
        Route::new("fast", "fast").loader(data_loader(json!("fast"))),
    ])]);
    router.initialize("/").await;

    let (slow, fast) = tokio::join!(router.navigate("/slow"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        router.navigate("/fast").await
    });

    assert!(slow.is_aborted());
    assert!(fast.is_success());
    let state = router.state();
    assert_eq!(state.location.pathname, "/fast");
    assert!(state.loader_data("slow").is_none());
    assert!(state.navigation.is_idle());
}

#[tokio::test]
async fn test_back_and_forward() {
    let router = router(vec![Route::new("root", "/").children(vec![
        Route::new("a", "a").loader(data_loader(json!("a"))),
        Route::new("b", "b").loader(data_loader(json!("b"))),
    ])]);

    router.initialize("/a").await;
    router.navigate("/b").await;
    assert!(router.forward().await.is_none());

    router.back().await.unwrap();
    assert_eq!(router.state().location.pathname, "/a");
    assert!(router.can_go_forward());

    router.forward().await.unwrap();
    assert_eq!(router.state().loader_data("b"), Some(&json!("b")));
    assert!(!router.can_go_forward());
}

#[tokio::test]
async fn test_push_to_current_href_replaces() {
    let router = router(vec![Route::new("root", "/").child(Route::new("a", "a"))]);

    router.initialize("/").await;
    router.navigate("/a").await;
    router.navigate("/a").await;
    router.back().await.unwrap();

    assert_eq!(router.current_path(), "/");
    assert!(!router.can_go_back());
}

#[tokio::test]
async fn test_explicit_revalidate_reruns_loaders() {
    let root = CallCounter::new();
    let router = router(vec![Route::new("root", "/").loader(counting_loader(&root, json!(1)))]);

    router.initialize("/").await;
    router.revalidate().await;

    assert_eq!(root.count(), 2);
}

#[tokio::test]
async fn test_middleware_wraps_navigation() {
    let log = CallLog::new();
    let (root_before, root_after) = (log.clone(), log.clone());
    let (page_before, page_after) = (log.clone(), log.clone());
    let router = router(vec![Route::new("root", "/")
        .middleware(middleware_fn(
            move |_| root_before.push("root:before"),
            move |_, _| root_after.push("root:after"),
        ))
        .child(Route::new("page", "page").middleware(middleware_fn(
            move |request| page_before.push(format!("page:before {}", request.to)),
            move |_, state| page_after.push(format!("page:after {}", state.status.as_u16())),
        )))]);

    router.initialize("/page").await;

    assert_eq!(
        log.entries(),
        vec![
            "root:before",
            "page:before /page",
            "page:after 200",
            "root:after"
        ]
    );
}

#[tokio::test]
async fn test_fetcher_load_and_errors() {
    let router = router(vec![Route::new("root", "/").error_boundary().children(vec![
        Route::new("search", "search").loader(loader_fn(|args: LoaderArgs| async move {
            let q = args.request.search_params().get("q").cloned().unwrap_or_default();
            Ok(RouteResponse::data(json!({ "q": q })))
        })),
        Route::new("static", "static"),
    ])]);
    router.initialize("/").await;

    let fetcher = router.fetch("search-box", "/search?q=rust").await.unwrap();
    assert!(fetcher.is_idle());
    assert_eq!(fetcher.data, Some(json!({ "q": "rust" })));

    let missing = router.fetch("other", "/static").await.unwrap();
    assert_eq!(missing.error.as_ref().map(RouteError::status), Some(400));

    assert_eq!(router.fetcher_keys(), vec!["other", "search-box"]);
    assert!(router.delete_fetcher("other"));
    assert!(router.fetcher("other").is_none());
    assert!(router.state().errors.is_none());
}

#[tokio::test]
async fn test_fetcher_submit_revalidates_current_location() {
    let root = CallCounter::new();
    let router = router(vec![Route::new("root", "/")
        .loader(counting_loader(&root, json!("root")))
        .child(Route::new("like", "like").action(action_fn(|_| async {
            Ok(RouteResponse::data(json!({ "liked": true })))
        })))]);
    router.initialize("/").await;

    let fetcher = router
        .fetcher_submit("like-1", "/like", Method::POST, FormData::new())
        .await
        .unwrap();

    assert_eq!(fetcher.data, Some(json!({ "liked": true })));
    assert_eq!(fetcher.state, FetcherState::Idle);
    assert_eq!(root.count(), 2);
    assert_eq!(router.state().location.pathname, "/");
}

#[tokio::test]
async fn test_fetcher_revalidation_sees_the_submission() {
    let root = CallCounter::new();
    let router = router(vec![Route::new("root", "/")
        .loader(counting_loader(&root, json!("root")))
        .should_revalidate(should_revalidate_fn(|args| {
            args.form_method == Some(&Method::POST)
                && args.action_status == Some(StatusCode::OK)
                && args.action_result == Some(&json!({ "liked": true }))
        }))
        .child(Route::new("like", "like").action(action_fn(|_| async {
            Ok(RouteResponse::data(json!({ "liked": true })))
        })))]);
    router.initialize("/").await;

    router
        .fetcher_submit("like-1", "/like", Method::POST, FormData::new())
        .await
        .unwrap();

    assert_eq!(root.count(), 2);
}

#[tokio::test]
async fn test_fetcher_redirect_navigates() {
    let router = router(vec![Route::new("root", "/").children(vec![
        Route::new("login", "login").action(action_fn(|_| async {
            Ok(RouteResponse::redirect("/home"))
        })),
        Route::new("home", "home").loader(data_loader(json!("home"))),
    ])]);
    router.initialize("/").await;

    router
        .fetcher_submit("login", "/login", Method::POST, FormData::new())
        .await
        .unwrap();

    assert_eq!(router.state().location.pathname, "/home");
    assert_eq!(router.state().loader_data("home"), Some(&json!("home")));
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let config = RouterConfig {
        max_depth: 0,
        ..RouterConfig::default()
    };
    let result = DataRouter::new(vec![Route::new("root", "/")], config);
    assert!(matches!(
        result,
        Err(RouterError::Build(BuildError::InvalidConfig(_)))
    ));
}

#[tokio::test]
async fn test_basename_is_stripped_from_locations() {
    let config = RouterConfig {
        basename: "/app".to_string(),
        ..RouterConfig::default()
    };
    let router = DataRouter::new(
        vec![Route::new("root", "/").child(Route::new("about", "about"))],
        config,
    )
    .unwrap();

    router.initialize("/about").await;

    assert_eq!(router.state().location.pathname, "/about");
    assert_eq!(
        router.url_for("/about?x=1").unwrap().as_str(),
        "http://localhost/app/about?x=1"
    );
}
