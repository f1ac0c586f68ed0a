//! Advances recurring transaction schedules and materializes the occurrences
//! that have come due.

use time::{Date, Duration, Month};

use crate::{
    Error,
    models::{DatabaseID, RecurringInterval},
    stores::LedgerStore,
};

/// Compute the occurrence date that follows `date` for the given interval.
///
/// Monthly schedules keep the day of the month, clamped to the last valid day
/// when the target month is shorter (Jan 31 -> Feb 28/29). Yearly schedules
/// clamp Feb 29 to Feb 28 off leap years. The result is always strictly later
/// than `date`.
///
/// # Errors
/// Returns an [Error::ScheduleOutOfRange] if the next occurrence falls outside
/// the range of representable dates.
pub fn next_occurrence(date: Date, interval: RecurringInterval) -> Result<Date, Error> {
    let next = match interval {
        RecurringInterval::Daily => date.checked_add(Duration::days(1)),
        RecurringInterval::Weekly => date.checked_add(Duration::weeks(1)),
        RecurringInterval::Monthly => {
            let year = if date.month() == Month::December {
                date.year() + 1
            } else {
                date.year()
            };

            clamped_date(year, date.month().next(), date.day())
        }
        RecurringInterval::Yearly => clamped_date(date.year() + 1, date.month(), date.day()),
    };

    next.ok_or(Error::ScheduleOutOfRange(date))
}

/// The calendar date for `year`/`month`/`day`, with `day` clamped down to the
/// last day of the month when the month is shorter.
fn clamped_date(year: i32, month: Month, day: u8) -> Option<Date> {
    (1..=day)
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
}

/// Materialize every occurrence that is due on or before `now`, catching up on
/// missed occurrences in order.
///
/// An origin whose schedule fell multiple intervals behind (e.g. the worker
/// was down) gets one copy per missed date. Returns the IDs of the created
/// occurrences. Running this twice for the same `now` creates nothing the
/// second time.
///
/// # Errors
/// Returns the first store error encountered; occurrences already
/// materialized before the error stay committed.
pub fn run_due<L>(store: &mut L, now: Date) -> Result<Vec<DatabaseID>, Error>
where
    L: LedgerStore,
{
    let mut created = Vec::new();

    for origin in store.due_recurring(now)? {
        loop {
            // Re-read the origin so a due date skipped over a conflict still
            // lets the rest of the catch-up proceed.
            let Some(recurrence) = store.get(origin.id)?.recurrence else {
                break;
            };
            if recurrence.next_occurrence_at > now {
                break;
            }

            if let Some(occurrence) = store.materialize_occurrence(origin.id, now)? {
                tracing::info!(
                    "materialized occurrence {} of transaction {} dated {}",
                    occurrence.id,
                    origin.id,
                    occurrence.date
                );
                created.push(occurrence.id);
            }
        }
    }

    Ok(created)
}


#[cfg(test)]
mod run_due_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        db::initialize,
        models::{
            AccountType, NewAccount, NewCategory, NewTransaction, Recurrence, RecurringInterval,
            TransactionType,
        },
        stores::{
            AccountStore, CategoryStore, LedgerStore,
            sqlite::{SQLiteAccountStore, SQLiteCategoryStore, SQLiteLedgerStore},
        },
    };

    use super::run_due;

    struct Fixture {
        ledger: SQLiteLedgerStore,
        accounts: SQLiteAccountStore,
        account_id: i64,
        category_id: i64,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let connection = Arc::new(Mutex::new(connection));

        let mut accounts = SQLiteAccountStore::new(connection.clone());
        let account = accounts
            .create(NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Current,
                balance: 0.0,
                is_default: true,
                user_id: 1,
            })
            .unwrap();

        let category = SQLiteCategoryStore::new(connection.clone())
            .create(NewCategory {
                name: "Subscriptions".to_owned(),
                category_type: TransactionType::Expense,
            })
            .unwrap();

        Fixture {
            ledger: SQLiteLedgerStore::new(connection),
            accounts,
            account_id: account.id,
            category_id: category.id,
        }
    }

    fn create_monthly_expense(fixture: &mut Fixture, amount: f64) -> i64 {
        fixture
            .ledger
            .create(NewTransaction {
                transaction_type: TransactionType::Expense,
                amount,
                date: date!(2024 - 01 - 15),
                description: Some("Streaming".to_owned()),
                account_id: fixture.account_id,
                category_id: fixture.category_id,
                recurrence: Some(Recurrence {
                    interval: RecurringInterval::Monthly,
                    next_occurrence_at: date!(2024 - 02 - 15),
                    last_processed_at: None,
                }),
                origin_id: None,
            })
            .unwrap()
            .id
    }

    #[test]
    fn catches_up_on_missed_occurrences_in_order() {
        let mut fixture = get_fixture();
        let origin_id = create_monthly_expense(&mut fixture, 10.0);

        let created = run_due(&mut fixture.ledger, date!(2024 - 04 - 20)).unwrap();

        assert_eq!(created.len(), 3, "three monthly occurrences were missed");
        let dates: Vec<_> = created
            .iter()
            .map(|id| fixture.ledger.get(*id).unwrap().date)
            .collect();
        assert_eq!(
            dates,
            vec![
                date!(2024 - 02 - 15),
                date!(2024 - 03 - 15),
                date!(2024 - 04 - 15)
            ]
        );

        let origin = fixture.ledger.get(origin_id).unwrap();
        let recurrence = origin.recurrence.unwrap();
        assert_eq!(
            recurrence.next_occurrence_at,
            date!(2024 - 05 - 15),
            "the schedule must end up at the first future occurrence"
        );
        assert_eq!(recurrence.last_processed_at, Some(date!(2024 - 04 - 20)));

        // Origin plus three copies.
        let balance = fixture.accounts.get(fixture.account_id).unwrap().balance;
        assert_eq!(balance, -40.0);
    }

    #[test]
    fn running_twice_creates_nothing_the_second_time() {
        let mut fixture = get_fixture();
        create_monthly_expense(&mut fixture, 10.0);
        let now = date!(2024 - 04 - 20);

        run_due(&mut fixture.ledger, now).unwrap();
        let balance_after_first = fixture.accounts.get(fixture.account_id).unwrap().balance;

        let second = run_due(&mut fixture.ledger, now).unwrap();

        assert_eq!(second, Vec::<i64>::new());
        assert_eq!(
            fixture.accounts.get(fixture.account_id).unwrap().balance,
            balance_after_first
        );
    }

    #[test]
    fn ignores_non_recurring_and_not_yet_due() {
        let mut fixture = get_fixture();
        fixture
            .ledger
            .create(NewTransaction {
                transaction_type: TransactionType::Expense,
                amount: 5.0,
                date: date!(2024 - 01 - 01),
                description: None,
                account_id: fixture.account_id,
                category_id: fixture.category_id,
                recurrence: None,
                origin_id: None,
            })
            .unwrap();
        fixture
            .ledger
            .create(NewTransaction {
                transaction_type: TransactionType::Expense,
                amount: 5.0,
                date: date!(2024 - 01 - 01),
                description: None,
                account_id: fixture.account_id,
                category_id: fixture.category_id,
                recurrence: Some(Recurrence {
                    interval: RecurringInterval::Weekly,
                    next_occurrence_at: date!(2024 - 01 - 08),
                    last_processed_at: None,
                }),
                origin_id: None,
            })
            .unwrap();

        let created = run_due(&mut fixture.ledger, date!(2024 - 01 - 07)).unwrap();

        assert_eq!(created, Vec::<i64>::new());
    }
}
