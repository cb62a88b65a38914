//! Column names of the three platform exports.
//!
//! Slices list accepted spellings in preference order.

/// Generic channel column some exports use instead of a prefixed one.
pub const CHANNEL: &str = "Channel";

pub mod campaign {
    pub const SEND_TIME: &str = "Send Time";
    pub const RECIPIENTS: &str = "Total Recipients";
    pub const UNIQUE_OPENS: &str = "Unique Opens";
    pub const UNIQUE_CLICKS: &str = "Unique Clicks";
    pub const REVENUE: &str = "Revenue";
    pub const CHANNEL: &str = "Campaign Channel";

    pub const ID: &[&str] = &["Campaign ID", "Campaign Id"];
    pub const NAME: &[&str] = &["Campaign Name"];
    pub const SUBJECT: &[&str] = &["Subject", "Subject Line"];
    pub const ORDERS: &[&str] = &["Unique Placed Order", "Placed Order", "Unique Ordered Product"];
    pub const UNSUBSCRIBES: &[&str] = &["Unsubscribes", "Unique Unsubscribes"];
    pub const SPAM_COMPLAINTS: &[&str] = &["Spam Complaints"];
    pub const BOUNCES: &[&str] = &["Bounces", "Bounced"];

    pub const OPEN_RATE: &[&str] = &["Open Rate"];
    pub const CLICK_RATE: &[&str] = &["Click Rate"];
    pub const ORDER_RATE: &[&str] = &["Placed Order Rate"];
    pub const UNSUBSCRIBE_RATE: &[&str] = &["Unsubscribe Rate"];
    pub const SPAM_RATE: &[&str] = &["Spam Complaints Rate", "Spam Complaint Rate"];
    pub const BOUNCE_RATE: &[&str] = &["Bounce Rate"];

    pub const REQUIRED: &[&str] = &[SEND_TIME, RECIPIENTS, REVENUE, UNIQUE_OPENS, UNIQUE_CLICKS];
}

pub mod flow {
    pub const DAY: &str = "Day";
    pub const FLOW_ID: &str = "Flow ID";
    pub const MESSAGE_ID: &str = "Flow Message ID";
    pub const MESSAGE_NAME: &str = "Flow Message Name";
    pub const STATUS: &str = "Status";
    pub const DELIVERED: &str = "Delivered";
    pub const CHANNEL: &str = "Flow Message Channel";

    pub const FLOW_NAME: &[&str] = &["Flow Name"];
    pub const UNIQUE_OPENS: &[&str] = &["Unique Opens"];
    pub const UNIQUE_CLICKS: &[&str] = &["Unique Clicks"];
    pub const ORDERS: &[&str] = &["Placed Order", "Unique Placed Order"];
    pub const REVENUE: &[&str] = &["Revenue", "Placed Order Value"];
    pub const UNSUBSCRIBES: &[&str] = &["Unsubscribes"];
    pub const SPAM_COMPLAINTS: &[&str] = &["Spam Complaints"];
    pub const BOUNCES: &[&str] = &["Bounces", "Bounced"];

    pub const OPEN_RATE: &[&str] = &["Open Rate"];
    pub const CLICK_RATE: &[&str] = &["Click Rate"];
    pub const ORDER_RATE: &[&str] = &["Placed Order Rate"];
    pub const UNSUBSCRIBE_RATE: &[&str] = &["Unsub Rate", "Unsubscribe Rate"];
    pub const SPAM_RATE: &[&str] = &["Complaint Rate", "Spam Complaint Rate"];
    pub const BOUNCE_RATE: &[&str] = &["Bounce Rate"];

    pub const REQUIRED: &[&str] = &[DAY, FLOW_ID, MESSAGE_ID, MESSAGE_NAME, STATUS, DELIVERED];
}

pub mod subscriber {
    pub const EMAIL: &str = "Email";
    pub const CONSENT: &str = "Email Marketing Consent";

    pub const ID: &[&str] = &["Klaviyo ID", "Profile ID"];
    pub const SUPPRESSIONS: &[&str] = &["Email Suppressions"];
    pub const FIRST_NAME: &[&str] = &["First Name"];
    pub const LAST_NAME: &[&str] = &["Last Name"];
    pub const PROFILE_CREATED: &[&str] = &["Profile Created On", "Created"];
    pub const FIRST_ACTIVE: &[&str] = &["First Active"];
    pub const LAST_ACTIVE: &[&str] = &["Last Active"];
    pub const LAST_OPEN: &[&str] = &["Last Open"];
    pub const LAST_CLICK: &[&str] = &["Last Click"];
    pub const TOTAL_CLV: &[&str] = &["Total Customer Lifetime Value"];
    pub const PREDICTED_CLV: &[&str] = &["Predicted Customer Lifetime Value"];
    pub const HISTORIC_ORDERS: &[&str] = &["Historic Number Of Orders", "Historic Number of Orders"];
    pub const AVG_ORDER_VALUE: &[&str] = &["Average Order Value"];

    pub const REQUIRED: &[&str] = &[EMAIL, CONSENT];
}
