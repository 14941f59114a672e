use tokio::sync::mpsc;
use crate::config::channels::{COMMAND_CAPACITY, NOTIFICATION_CAPACITY, UPDATE_CAPACITY};
use crate::dashboard::domain::{DashboardCommand, SummaryUpdate};
use crate::message::domain::NotificationMessage;


pub struct Channels {
    pub presentation_to_dashboard: mpsc::Sender<DashboardCommand>,
    pub dashboard_from_presentation: mpsc::Receiver<DashboardCommand>,

    pub live_to_dashboard: mpsc::Sender<SummaryUpdate>,
    pub dashboard_from_live: mpsc::Receiver<SummaryUpdate>,

    pub notification_to_presentation: mpsc::Sender<NotificationMessage>,
    pub presentation_from_notification: mpsc::Receiver<NotificationMessage>,
}


impl Channels {
    pub fn new() -> Channels {
        let (p_to_d, d_from_p) = mpsc::channel::<DashboardCommand>(COMMAND_CAPACITY);
        let (l_to_d, d_from_l) = mpsc::channel::<SummaryUpdate>(UPDATE_CAPACITY);
        let (n_to_p, p_from_n) = mpsc::channel::<NotificationMessage>(NOTIFICATION_CAPACITY);

        Self {
            presentation_to_dashboard: p_to_d,
            dashboard_from_presentation: d_from_p,
            live_to_dashboard: l_to_d,
            dashboard_from_live: d_from_l,
            notification_to_presentation: n_to_p,
            presentation_from_notification: p_from_n,
        }
    }
}
