mod admin;
mod config;
mod database;
mod editor;
mod error;
mod export;
mod fixtures;
mod model;
mod public;
mod session;
mod view;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{error as web_error, middleware::Logger, web, App, HttpResponse, HttpServer};
use config::{Backend, Config};
use database::{seed_from_fixtures, Catalog};
use fixtures::FixtureStore;
use log::{debug, info};
use model::SessionUser;

type Tera = web::Data<tera::Tera>;
type Db<D> = web::Data<D>;

fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> web_error::Error {
    debug!("{:?}", err);
    web_error::ErrorInternalServerError(message)
}

fn render(tera: &tera::Tera, name: &str, ctx: &tera::Context) -> actix_web::Result<HttpResponse> {
    let body = tera
        .render(name, ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header(("location", location))
        .finish()
}

/// Template context every page starts from.
fn page_context(user: Option<SessionUser>) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("is_admin", &user.as_ref().map(|u| u.is_admin()).unwrap_or(false));
    ctx.insert("user", &user);
    ctx
}

fn templates() -> tera::Result<tera::Tera> {
    tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
}

fn identity_service(private_key: &[u8]) -> IdentityService<CookieIdentityPolicy> {
    IdentityService::new(
        CookieIdentityPolicy::new(private_key)
            .name("auth-cookie")
            .secure(false),
    )
}

fn routes<D: Catalog>(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(public::index::<D>))
        .route("/pages/movie/{id}", web::get().to(public::movie_detail::<D>))
        .route("/login", web::get().to(public::login))
        .route("/login", web::post().to(public::login_post::<D>))
        .route("/register", web::get().to(public::register))
        .route("/register", web::post().to(public::register_post::<D>))
        .route("/logout", web::get().to(public::logout))
        .route("/data/{kind}.json", web::get().to(public::fixture::<D>))
        .route("/admin", web::get().to(admin::dashboard::<D>))
        .route("/admin/movies", web::get().to(admin::movies::<D>))
        .route("/admin/movies", web::post().to(admin::save_movie::<D>))
        .route("/admin/movies/new", web::get().to(admin::new_movie::<D>))
        .route("/admin/movies/{id}/edit", web::get().to(admin::edit_movie::<D>))
        .route("/admin/movies/{id}/delete", web::get().to(admin::confirm_delete::<D>))
        .route("/admin/movies/{id}/delete", web::post().to(admin::delete_movie::<D>))
        .route("/admin/export/{kind}.{format}", web::get().to(admin::export::<D>))
        .route("/admin/import/movies", web::post().to(admin::import_movies::<D>));
}

fn to_io<E: std::fmt::Display>(err: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

async fn serve<D: Catalog>(config: Config, db: Db<D>) -> std::io::Result<()> {
    let tera = web::Data::new(templates().map_err(to_io)?);
    let private_key = config.cookie_key.clone();
    info!("Listening on {}", config.bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(identity_service(&private_key))
            .app_data(tera.clone())
            .app_data(db.clone())
            .configure(routes::<D>)
    })
    .bind(config.bind.as_str())?
    .run()
    .await
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("moviecat=debug,actix_web=info"),
    )
    .init();

    let config = Config::from_env().map_err(to_io)?;
    match config.backend {
        Backend::Memory => {
            let store = FixtureStore::load(&config.data_dir).map_err(to_io)?;
            serve(config, web::Data::new(store)).await
        }
        Backend::Sled => {
            let db = match &config.sled_path {
                Some(path) => sled::open(path),
                None => sled::Config::new().temporary(true).open(),
            }
            .map_err(to_io)?;
            seed_from_fixtures(&db, &config.data_dir).map_err(to_io)?;
            serve(config, web::Data::new(db)).await
        }
    }
}
