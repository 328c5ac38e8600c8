use criterion::{criterion_group, criterion_main, Criterion};
use dio::params::Params;
use dio::router::{Router, Verb};
use dio::{reply, App, ControllerBuilder, Request, Settings};
use http::Method;
use std::hint::black_box;

fn zoo_router() -> Router {
    let mut router = Router::new();
    let rules = [
        (Verb::get(), "/animals", "index"),
        (Verb::post(), "/animals", "create"),
        (Verb::get(), "/animals/:id", "show"),
        (Verb::put(), "/animals/:id", "update"),
        (Verb::delete(), "/animals/:id", "destroy"),
        (Verb::get(), "/animals/:id/toys/:toy_id", "toy"),
        (Verb::Any, "/:category/animals/:id/habitats/:habitat_id/sections/:section_id", "section"),
        (Verb::Any, "/files/*", "file"),
        (Verb::get(), "/feed.?:format?", "feed"),
    ];
    for (verb, pattern, action) in rules {
        router.add(verb, pattern, action).expect("pattern compiles");
    }
    router.install_defaults().expect("default patterns compile");
    router
}

fn bench_route_throughput(c: &mut Criterion) {
    let router = zoo_router();
    let test_paths = [
        (Method::GET, "/zoo/animals/123"),
        (Method::GET, "/zoo/animals/123/toys/456"),
        (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
        (Method::GET, "/zoo/files/a/b/c.txt"),
        (Method::GET, "/zoo/feed.json"),
        (Method::POST, "/zoo/edit/42.json"),
    ];
    c.bench_function("route_match", |b| {
        b.iter(|| {
            for (method, path) in &test_paths {
                let mut params = Params::new();
                let res = router.match_route(method, path, &mut params);
                black_box((&res, &params));
            }
        })
    });
}

fn bench_full_dispatch(c: &mut Criterion) {
    let app = App::new(Settings::default());
    app.register(
        ControllerBuilder::new("zoo")
            .get("/animals/:id", "show")
            .action("show", |c| {
                let id = c.params.get_str("id").unwrap_or_default().to_string();
                dio::done(reply![200, [("content_type", "text/plain")], id])
            })
            .build()
            .expect("controller builds"),
    );
    c.bench_function("app_call", |b| {
        b.iter(|| {
            let response = app.call(Request::new(Method::GET, "/zoo/animals/123"));
            black_box(response);
        })
    });
}

criterion_group!(benches, bench_route_throughput, bench_full_dispatch);
criterion_main!(benches);
