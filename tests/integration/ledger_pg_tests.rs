//! Ledger tests against Postgres row locking
//!
//! Needs a reachable database in `DATABASE_URL`:
//! `cargo test --test ledger_pg_tests -- --ignored`

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::postgres::PgPoolOptions;

use campus_library_server::{
    error::AppError,
    models::{
        publication::CreatePublication,
        user::{Actor, NewAccount},
        LoanStatus, PublicationType, Role,
    },
    repository::Repository,
    services::loans::LoansService,
};

fn unique() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{:x}", nanos % 0xffff_ffff_ffff)
}

async fn repository() -> Repository {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    Repository::new(pool, 5000)
}

async fn member(repository: &Repository, role: Role) -> Actor {
    let suffix = unique();
    let account = repository
        .users
        .create(&NewAccount {
            email: format!("{}.{}@aust.edu", role, suffix),
            password_hash: "unused".to_string(),
            role,
            member_code: format!("T-{}", suffix),
            name: format!("Test {}", role),
            department: Some("CSE".to_string()),
            designation: None,
            phone: None,
        })
        .await
        .expect("Failed to create account");
    Actor::new(account.id, role)
}

async fn publication(repository: &Repository, copies: i32) -> i32 {
    repository
        .publications
        .create(&CreatePublication {
            title: format!("Distributed Systems {}", unique()),
            author: "M. van Steen".to_string(),
            isbn: None,
            publication_year: Some(2017),
            publisher: None,
            department: Some("CSE".to_string()),
            publication_type: PublicationType::Book,
            total_copies: Some(copies),
            shelf_location: None,
            description: None,
            cover_url: None,
        })
        .await
        .expect("Failed to create publication")
        .id
}

async fn available(repository: &Repository, publication_id: i32) -> i32 {
    repository
        .publications
        .get_by_id(publication_id)
        .await
        .expect("Publication vanished")
        .available_copies
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Run with: cargo test -- --ignored
async fn test_last_copy_goes_to_one_borrower() {
    let repository = repository().await;
    let loans = LoansService::new(Arc::new(repository.loans.clone()));

    for _ in 0..10 {
        let publication_id = publication(&repository, 1).await;
        let first = member(&repository, Role::Student).await;
        let second = member(&repository, Role::Faculty).await;

        let a = {
            let loans = loans.clone();
            tokio::spawn(async move { loans.borrow(&first, publication_id).await })
        };
        let b = {
            let loans = loans.clone();
            tokio::spawn(async move { loans.borrow(&second, publication_id).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::Unavailable(_))))
                .count(),
            1
        );
        assert_eq!(available(&repository, publication_id).await, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_borrows_stop_at_cap() {
    let repository = repository().await;
    let loans = LoansService::new(Arc::new(repository.loans.clone()));
    let student = member(&repository, Role::Student).await;

    for _ in 0..2 {
        let publication_id = publication(&repository, 1).await;
        loans.borrow(&student, publication_id).await.unwrap();
    }

    let mut publications = Vec::new();
    for _ in 0..4 {
        publications.push(publication(&repository, 1).await);
    }

    let handles: Vec<_> = publications
        .iter()
        .map(|&publication_id| {
            let loans = loans.clone();
            tokio::spawn(async move { loans.borrow(&student, publication_id).await })
        })
        .collect();

    let mut granted = 0;
    let mut capped = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::LimitExceeded(_)) => capped += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(capped, 3);

    let active = loans
        .my_loans(&student)
        .await
        .unwrap()
        .into_iter()
        .filter(|l| l.status.is_active())
        .count();
    assert_eq!(active, 3);

    let on_shelf: i32 = {
        let mut total = 0;
        for &publication_id in &publications {
            total += available(&repository, publication_id).await;
        }
        total
    };
    assert_eq!(on_shelf, 3);
}

#[tokio::test]
#[ignore]
async fn test_second_return_leaves_shelf_count_alone() {
    let repository = repository().await;
    let loans = LoansService::new(Arc::new(repository.loans.clone()));
    let student = member(&repository, Role::Student).await;
    let publication_id = publication(&repository, 2).await;

    let loan = loans.borrow(&student, publication_id).await.unwrap();
    assert_eq!(available(&repository, publication_id).await, 1);

    let receipt = loans.return_loan(&student, loan.id).await.unwrap();
    assert_eq!(receipt.loan.status, LoanStatus::Returned);
    assert_eq!(available(&repository, publication_id).await, 2);

    let again = loans.return_loan(&student, loan.id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
    assert_eq!(available(&repository, publication_id).await, 2);
}

#[tokio::test]
#[ignore]
async fn test_publication_with_history_cannot_be_deleted() {
    let repository = repository().await;
    let loans = LoansService::new(Arc::new(repository.loans.clone()));
    let student = member(&repository, Role::Student).await;
    let publication_id = publication(&repository, 1).await;

    let loan = loans.borrow(&student, publication_id).await.unwrap();
    loans.return_loan(&student, loan.id).await.unwrap();

    let result = repository.publications.delete(publication_id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let unused = publication(&repository, 1).await;
    repository.publications.delete(unused).await.unwrap();
    assert!(matches!(
        repository.publications.get_by_id(unused).await,
        Err(AppError::NotFound(_))
    ));
}
