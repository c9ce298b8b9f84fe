//! Business logic services

pub mod books;
pub mod fine_job;
pub mod fines;
pub mod rentals;
pub mod stats;
pub mod users;

use crate::{config::AuthConfig, error::AppResult, fines::LibraryPolicy, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub books: books::BooksService,
    pub rentals: rentals::RentalsService,
    pub fines: fines::FinesService,
    pub stats: stats::StatsService,
    pub fine_job: fine_job::FineJob<Repository>,
    pub policy: LibraryPolicy,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, policy: LibraryPolicy) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), auth_config, policy.clone()),
            books: books::BooksService::new(repository.clone(), policy.clone()),
            rentals: rentals::RentalsService::new(repository.clone(), policy.clone()),
            fines: fines::FinesService::new(repository.clone(), policy.clone()),
            stats: stats::StatsService::new(repository.clone()),
            fine_job: fine_job::FineJob::new(repository.clone(), policy.clone()),
            policy,
            repository,
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
