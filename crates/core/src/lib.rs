pub mod consumer;
pub mod groups;
pub mod key;
pub mod route;
pub mod subject;
pub mod token;

pub use consumer::{Consumer, ConsumerGroup, ConsumerPlugins, GroupPlugins, KeyAuth};
pub use groups::{ADMIN_GROUP, EUMETNET_USER_GROUP, KNOWN_GROUPS, USER_GROUP, desired_group_id};
pub use key::{AUTH_KEY_FIELD, KeyRecord, RECORD_DATE_FORMAT, derive_auth_key, record_date};
pub use route::{LimitCount, LimitReq, Route, RoutePlugins};
pub use subject::Subject;
pub use token::AccessToken;
