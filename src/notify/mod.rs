pub mod dispatcher;
pub mod notification;

pub use dispatcher::{Dispatcher, Inbox, LogTransport, NotificationTransport};
pub use notification::{Notification, NotificationKind, NotificationStatus};
