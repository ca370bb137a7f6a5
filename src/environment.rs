use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use std::sync::Arc;

use crate::todo::data::PublicId;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The calendar day due dates are checked against.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> PublicId;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> PublicId {
        PublicId::from(Uuid::new_v4())
    }
}

#[derive(Clone)]
pub struct TodoEnvironment {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

impl TodoEnvironment {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> TodoEnvironment {
        TodoEnvironment { clock, ids }
    }

    pub fn system() -> TodoEnvironment {
        TodoEnvironment::new(Arc::new(SystemClock), Arc::new(RandomIds))
    }
}
