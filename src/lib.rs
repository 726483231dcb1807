#![allow(dead_code)]

pub mod handler;
pub mod website_layout;
pub mod time_util;
pub mod apachelog;
pub mod hostrouter;
pub mod http_request_method;
pub mod time_guard;
pub mod warn;
pub mod aresponse;
pub mod nav;
pub mod acontext;
pub mod webparts;
pub mod http_response_status_codes;
pub mod markdown;
pub mod router;
pub mod util;
pub mod path;
pub mod webutils;
pub mod miniarcswap;
pub mod ppath;

// ~formsite specific
pub mod formschema;
pub mod formsubmit;
pub mod formrender;
pub mod formdir;
