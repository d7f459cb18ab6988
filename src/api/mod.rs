use rocket::Route;

mod common;
mod conventions;
mod nominations;
mod races;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(conventions::routes());
    routes.extend(nominations::routes());
    routes.extend(races::routes());
    routes.extend(voting::routes());
    routes
}

#[cfg(test)]
pub(crate) mod testing {
    use rocket::{http::Cookie, local::asynchronous::Client};

    use crate::config::Config;
    use crate::model::api::auth::{AuthToken, User};

    /// A signed auth cookie for the given user, as the sign-in service would issue it.
    pub fn auth_cookie<U: User>(client: &Client, user: &U) -> Cookie<'static> {
        let config = client.rocket().state::<Config>().unwrap();
        AuthToken::new(user).into_cookie(config)
    }
}
