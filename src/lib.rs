pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod claims;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod user;
}

pub mod services {
    pub mod user_cache;
    pub mod user_directory;
    pub mod verifier;
}

pub mod handlers {
    pub mod session;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod cache_control;
    pub mod gate;
    pub mod login;
    pub mod scope;
}
