use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::logger::LoggerMiddleware;
use crate::middleware::ProtectedPages;
use crate::routes::{get_current_user, health_check, login, logout, refresh, register};
use crate::state::AuthContext;
use crate::store::CredentialStore;

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    context: AuthContext,
) -> Result<Server, std::io::Error> {
    let store: web::Data<dyn CredentialStore> = web::Data::from(store);
    let page_tokens = context.tokens.clone();
    let context = web::Data::new(context);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(ProtectedPages::new(page_tokens.clone()))
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(store.clone())
            .app_data(context.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    .route("/login", web::post().to(login))
                    .route("/register", web::post().to(register))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .route("/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
