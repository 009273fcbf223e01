// Wabi Engine
//
//   http   : reqwest client factory and body helpers
//   session: AppSession: credential + shared link flag
//   pairing: the connection pairing monitor and its backend

pub mod http;
pub mod pairing;
pub mod session;
