//! Implements the SQLite backed ledger store.
//!
//! Every mutation adjusts the owning account's cached balance in the same SQL
//! transaction as the row change, so a crash or error can never leave the
//! balance out of step with the rows. The partial unique index on
//! `(origin_id, date)` acts as the idempotency key for occurrence
//! materialization: re-running a due schedule books at most one copy per due
//! date.
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    db::{CreateTable, MapRow},
    models::{AccountId, DatabaseID, NewTransaction, Recurrence, RecurringInterval, Transaction},
    recurrence::next_occurrence,
    stores::LedgerStore,
};

/// Stores transactions and the derived account balances in a SQLite database.
///
/// Note that because a transaction depends on the
/// [Account](crate::models::Account) and [Category](crate::models::Category)
/// models, these models must be set up in the database.
#[derive(Debug, Clone)]
pub struct SQLiteLedgerStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteLedgerStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    /// Compare every account's cached balance against the signed sum of its
    /// live transactions, optionally repairing any drift found.
    ///
    /// The hot path maintains balances incrementally and never recomputes them
    /// by scanning; this audit is the offline exception.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an unexpected SQL error.
    pub fn reconcile_balances(&mut self, repair: bool) -> Result<Vec<BalanceDrift>, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;
        let tx = connection.unchecked_transaction()?;

        let drifts = tx
            .prepare(
                "SELECT a.id, a.balance,
                        COALESCE(SUM(CASE WHEN t.transaction_type = 'INCOME'
                                          THEN t.amount ELSE -t.amount END), 0.0)
                 FROM account a
                 LEFT JOIN \"transaction\" t ON t.account_id = a.id
                 GROUP BY a.id, a.balance",
            )?
            .query_map([], |row| {
                Ok(BalanceDrift {
                    account_id: row.get(0)?,
                    cached: row.get(1)?,
                    computed: row.get(2)?,
                })
            })?
            .map(|maybe_drift| maybe_drift.map_err(Error::from))
            .collect::<Result<Vec<_>, _>>()?;

        let drifts: Vec<_> = drifts
            .into_iter()
            .filter(|drift| (drift.cached - drift.computed).abs() > f64::EPSILON)
            .collect();

        if repair {
            for drift in &drifts {
                tx.execute(
                    "UPDATE account SET balance = ?1 WHERE id = ?2",
                    (drift.computed, drift.account_id),
                )?;
            }
        }

        tx.commit()?;

        Ok(drifts)
    }
}

/// A cached account balance that disagrees with the signed sum of the
/// account's live transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDrift {
    /// The account whose balance drifted.
    pub account_id: AccountId,
    /// The balance the account row holds.
    pub cached: f64,
    /// The signed sum of the account's live transactions.
    pub computed: f64,
}

impl CreateTable for SQLiteLedgerStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS \"transaction\" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    transaction_type TEXT NOT NULL,
                    amount REAL NOT NULL,
                    date TEXT NOT NULL,
                    description TEXT,
                    account_id INTEGER NOT NULL,
                    category_id INTEGER NOT NULL,
                    recurring_interval TEXT,
                    next_occurrence_at TEXT,
                    last_processed_at TEXT,
                    origin_id INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY(account_id) REFERENCES account(id),
                    FOREIGN KEY(category_id) REFERENCES category(id),
                    FOREIGN KEY(origin_id) REFERENCES \"transaction\"(id) ON DELETE SET NULL
                    )",
            (),
        )?;

        // The idempotency key for occurrence materialization.
        connection.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_transaction_origin_date
             ON \"transaction\"(origin_id, date) WHERE origin_id IS NOT NULL",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteLedgerStore {
    type ReturnType = Transaction;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let recurring_interval: Option<RecurringInterval> = row.get(offset + 7)?;
        let next_occurrence_at: Option<Date> = row.get(offset + 8)?;
        let last_processed_at: Option<Date> = row.get(offset + 9)?;

        let recurrence = match (recurring_interval, next_occurrence_at) {
            (Some(interval), Some(next_occurrence_at)) => Some(Recurrence {
                interval,
                next_occurrence_at,
                last_processed_at,
            }),
            _ => None,
        };

        Ok(Transaction {
            id: row.get(offset)?,
            transaction_type: row.get(offset + 1)?,
            amount: row.get(offset + 2)?,
            date: row.get(offset + 3)?,
            description: row.get(offset + 4)?,
            account_id: row.get(offset + 5)?,
            category_id: row.get(offset + 6)?,
            recurrence,
            origin_id: row.get(offset + 10)?,
            created_at: row.get(offset + 11)?,
            updated_at: row.get(offset + 12)?,
        })
    }
}

impl LedgerStore for SQLiteLedgerStore {
    fn create(&mut self, new_transaction: NewTransaction) -> Result<Transaction, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;
        let tx = connection.unchecked_transaction()?;

        let Some(transaction) =
            insert_transaction(&tx, &new_transaction, OffsetDateTime::now_utc())?
        else {
            // Only reachable when the caller supplies an (origin, date) pair
            // that is already booked.
            return Err(Error::Conflict);
        };

        adjust_balance(&tx, transaction.account_id, transaction.signed_amount())?;

        tx.commit()?;

        Ok(transaction)
    }

    fn update(
        &mut self,
        id: DatabaseID,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;
        let tx = connection.unchecked_transaction()?;

        let existing = select_transaction(&tx, id)?;

        let (interval, next_occurrence_at, last_processed_at) =
            split_recurrence(new_transaction.recurrence);

        let updated = tx
            .prepare(
                "UPDATE \"transaction\"
                 SET transaction_type = ?1, amount = ?2, date = ?3, description = ?4,
                     account_id = ?5, category_id = ?6, recurring_interval = ?7,
                     next_occurrence_at = ?8, last_processed_at = ?9, origin_id = ?10,
                     updated_at = ?11
                 WHERE id = ?12
                 RETURNING id, transaction_type, amount, date, description, account_id,
                           category_id, recurring_interval, next_occurrence_at,
                           last_processed_at, origin_id, created_at, updated_at",
            )?
            .query_row(
                (
                    new_transaction.transaction_type,
                    new_transaction.amount,
                    new_transaction.date,
                    &new_transaction.description,
                    new_transaction.account_id,
                    new_transaction.category_id,
                    interval,
                    next_occurrence_at,
                    last_processed_at,
                    new_transaction.origin_id,
                    OffsetDateTime::now_utc(),
                    id,
                ),
                Self::map_row,
            )
            .map_err(|error| match error {
                // Code 787 occurs when a FOREIGN KEY constraint failed.
                // The client tried to move the transaction to a non-existent
                // account or category.
                rusqlite::Error::SqliteFailure(sql_error, Some(_))
                    if sql_error.extended_code == 787 =>
                {
                    Error::NotFound
                }
                error => error.into(),
            })?;

        if updated.account_id == existing.account_id {
            adjust_balance(
                &tx,
                updated.account_id,
                updated.signed_amount() - existing.signed_amount(),
            )?;
        } else {
            // Account moved: reverse on the old account and apply on the new
            // one, committing both or neither.
            adjust_balance(&tx, existing.account_id, -existing.signed_amount())?;
            adjust_balance(&tx, updated.account_id, updated.signed_amount())?;
        }

        tx.commit()?;

        Ok(updated)
    }

    fn delete(&mut self, id: DatabaseID) -> Result<Transaction, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;
        let tx = connection.unchecked_transaction()?;

        let existing = select_transaction(&tx, id)?;

        adjust_balance(&tx, existing.account_id, -existing.signed_amount())?;
        tx.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

        tx.commit()?;

        Ok(existing)
    }

    fn get(&self, id: DatabaseID) -> Result<Transaction, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;

        select_transaction(&connection, id)
    }

    fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>, Error> {
        self.connection
            .lock()
            .map_err(|_| Error::DatabaseLock)?
            .prepare(
                "SELECT id, transaction_type, amount, date, description, account_id,
                        category_id, recurring_interval, next_occurrence_at,
                        last_processed_at, origin_id, created_at, updated_at
                 FROM \"transaction\"
                 WHERE account_id = :account_id
                 ORDER BY date DESC, id DESC",
            )?
            .query_map(&[(":account_id", &account_id)], Self::map_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }

    fn due_recurring(&self, now: Date) -> Result<Vec<Transaction>, Error> {
        self.connection
            .lock()
            .map_err(|_| Error::DatabaseLock)?
            .prepare(
                "SELECT id, transaction_type, amount, date, description, account_id,
                        category_id, recurring_interval, next_occurrence_at,
                        last_processed_at, origin_id, created_at, updated_at
                 FROM \"transaction\"
                 WHERE next_occurrence_at IS NOT NULL AND next_occurrence_at <= :now
                 ORDER BY id ASC",
            )?
            .query_map(&[(":now", &now)], Self::map_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }

    fn materialize_occurrence(
        &mut self,
        origin_id: DatabaseID,
        now: Date,
    ) -> Result<Option<Transaction>, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;
        let tx = connection.unchecked_transaction()?;

        let origin = select_transaction(&tx, origin_id)?;
        let Some(recurrence) = origin.recurrence else {
            return Ok(None);
        };
        if recurrence.next_occurrence_at > now {
            return Ok(None);
        }

        let copy = NewTransaction {
            transaction_type: origin.transaction_type,
            amount: origin.amount,
            date: recurrence.next_occurrence_at,
            description: origin.description.clone(),
            account_id: origin.account_id,
            category_id: origin.category_id,
            recurrence: None,
            origin_id: Some(origin.id),
        };

        let occurrence = insert_transaction(&tx, &copy, OffsetDateTime::now_utc())?;
        match &occurrence {
            Some(occurrence) => {
                adjust_balance(&tx, occurrence.account_id, occurrence.signed_amount())?;
            }
            // The due date was already booked by an earlier run; advance the
            // schedule past it without double-booking.
            None => tracing::debug!(
                "occurrence of transaction {origin_id} dated {} already exists",
                recurrence.next_occurrence_at
            ),
        }

        let next = next_occurrence(recurrence.next_occurrence_at, recurrence.interval)?;
        tx.execute(
            "UPDATE \"transaction\"
             SET next_occurrence_at = ?1, last_processed_at = ?2, updated_at = ?3
             WHERE id = ?4",
            (next, now, OffsetDateTime::now_utc(), origin_id),
        )?;

        tx.commit()?;

        Ok(occurrence)
    }
}

fn split_recurrence(
    recurrence: Option<Recurrence>,
) -> (Option<RecurringInterval>, Option<Date>, Option<Date>) {
    match recurrence {
        Some(recurrence) => (
            Some(recurrence.interval),
            Some(recurrence.next_occurrence_at),
            recurrence.last_processed_at,
        ),
        None => (None, None, None),
    }
}

/// Insert a transaction row, returning `None` when the `(origin, date)` pair
/// was already booked by a previous materialization.
fn insert_transaction(
    connection: &Connection,
    new_transaction: &NewTransaction,
    now: OffsetDateTime,
) -> Result<Option<Transaction>, Error> {
    let (interval, next_occurrence_at, last_processed_at) =
        split_recurrence(new_transaction.recurrence);

    let result = connection
        .prepare(
            "INSERT INTO \"transaction\" (transaction_type, amount, date, description,
                    account_id, category_id, recurring_interval, next_occurrence_at,
                    last_processed_at, origin_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(origin_id, date) WHERE origin_id IS NOT NULL DO NOTHING
             RETURNING id, transaction_type, amount, date, description, account_id,
                       category_id, recurring_interval, next_occurrence_at,
                       last_processed_at, origin_id, created_at, updated_at",
        )?
        .query_row(
            (
                new_transaction.transaction_type,
                new_transaction.amount,
                new_transaction.date,
                &new_transaction.description,
                new_transaction.account_id,
                new_transaction.category_id,
                interval,
                next_occurrence_at,
                last_processed_at,
                new_transaction.origin_id,
                now,
                now,
            ),
            SQLiteLedgerStore::map_row,
        );

    match result {
        Ok(transaction) => Ok(Some(transaction)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        // Code 787 occurs when a FOREIGN KEY constraint failed.
        // The client tried to add a transaction for a non-existent account or
        // category.
        Err(rusqlite::Error::SqliteFailure(sql_error, Some(_))) if sql_error.extended_code == 787 => {
            Err(Error::NotFound)
        }
        Err(error) => Err(error.into()),
    }
}

fn select_transaction(connection: &Connection, id: DatabaseID) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, transaction_type, amount, date, description, account_id,
                    category_id, recurring_interval, next_occurrence_at,
                    last_processed_at, origin_id, created_at, updated_at
             FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], SQLiteLedgerStore::map_row)?;

    Ok(transaction)
}

fn adjust_balance(connection: &Connection, account_id: AccountId, delta: f64) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE account SET balance = balance + ?1 WHERE id = ?2",
        (delta, account_id),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod sqlite_ledger_store_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::{Date, macros::date};

    use crate::{
        Error,
        db::initialize,
        models::{
            Account, AccountId, AccountType, Category, NewAccount, NewCategory, NewTransaction,
            Recurrence, RecurringInterval, Transaction, TransactionType,
        },
        stores::{
            AccountStore, CategoryStore, LedgerStore,
            sqlite::{SQLiteAccountStore, SQLiteCategoryStore},
        },
    };

    use super::SQLiteLedgerStore;

    struct Fixture {
        connection: Arc<Mutex<Connection>>,
        ledger: SQLiteLedgerStore,
        accounts: SQLiteAccountStore,
        account: Account,
        other_account: Account,
        income_category: Category,
        expense_category: Category,
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
        let other_account = accounts
            .create(NewAccount {
                name: "Rainy Day".to_owned(),
                account_type: AccountType::Savings,
                balance: 0.0,
                is_default: false,
                user_id: 1,
            })
            .unwrap();

        let mut categories = SQLiteCategoryStore::new(connection.clone());
        let income_category = categories
            .create(NewCategory {
                name: "Salary".to_owned(),
                category_type: TransactionType::Income,
            })
            .unwrap();
        let expense_category = categories
            .create(NewCategory {
                name: "Groceries".to_owned(),
                category_type: TransactionType::Expense,
            })
            .unwrap();

        Fixture {
            ledger: SQLiteLedgerStore::new(connection.clone()),
            connection,
            accounts,
            account,
            other_account,
            income_category,
            expense_category,
        }
    }

    fn balance_of(fixture: &Fixture, account_id: AccountId) -> f64 {
        fixture.accounts.get(account_id).unwrap().balance
    }

    fn new_expense(fixture: &Fixture, amount: f64, date: Date) -> NewTransaction {
        NewTransaction {
            transaction_type: TransactionType::Expense,
            amount,
            date,
            description: None,
            account_id: fixture.account.id,
            category_id: fixture.expense_category.id,
            recurrence: None,
            origin_id: None,
        }
    }

    fn new_income(fixture: &Fixture, amount: f64, date: Date) -> NewTransaction {
        NewTransaction {
            transaction_type: TransactionType::Income,
            amount,
            date,
            description: None,
            account_id: fixture.account.id,
            category_id: fixture.income_category.id,
            recurrence: None,
            origin_id: None,
        }
    }

    #[test]
    fn create_expense_decreases_balance() {
        let mut fixture = get_fixture();

        let transaction = fixture
            .ledger
            .create(new_expense(&fixture, 19.99, date!(2024 - 01 - 31)))
            .unwrap();

        assert_eq!(transaction.amount, 19.99);
        assert_eq!(transaction.signed_amount(), -19.99);
        assert!(!transaction.is_recurring());
        assert_eq!(balance_of(&fixture, fixture.account.id), -19.99);
    }

    #[test]
    fn create_income_increases_balance() {
        let mut fixture = get_fixture();

        fixture
            .ledger
            .create(new_income(&fixture, 1250.0, date!(2024 - 01 - 15)))
            .unwrap();

        assert_eq!(balance_of(&fixture, fixture.account.id), 1250.0);
    }

    #[test]
    fn create_fails_on_missing_account_without_partial_write() {
        let mut fixture = get_fixture();
        let missing_account = fixture.other_account.id + 99;

        let got = fixture.ledger.create(NewTransaction {
            account_id: missing_account,
            ..new_expense(&fixture, 10.0, date!(2024 - 01 - 01))
        });

        assert_eq!(got, Err(Error::NotFound));
        assert_eq!(balance_of(&fixture, fixture.account.id), 0.0);
        assert_eq!(
            fixture.ledger.list_by_account(fixture.account.id).unwrap(),
            vec![],
            "no row may persist when the balance update cannot commit"
        );
    }

    #[test]
    fn update_applies_signed_delta_on_type_change() {
        let mut fixture = get_fixture();
        let expense = fixture
            .ledger
            .create(new_expense(&fixture, 50.0, date!(2024 - 02 - 01)))
            .unwrap();
        assert_eq!(balance_of(&fixture, fixture.account.id), -50.0);

        fixture
            .ledger
            .update(expense.id, new_income(&fixture, 50.0, date!(2024 - 02 - 01)))
            .unwrap();

        // Reversal of the expense plus application of the income: +100.
        assert_eq!(balance_of(&fixture, fixture.account.id), 50.0);
    }

    #[test]
    fn update_moves_amounts_between_accounts() {
        let mut fixture = get_fixture();
        let expense = fixture
            .ledger
            .create(new_expense(&fixture, 25.5, date!(2024 - 02 - 02)))
            .unwrap();

        fixture
            .ledger
            .update(
                expense.id,
                NewTransaction {
                    account_id: fixture.other_account.id,
                    ..new_expense(&fixture, 25.5, date!(2024 - 02 - 02))
                },
            )
            .unwrap();

        assert_eq!(balance_of(&fixture, fixture.account.id), 0.0);
        assert_eq!(balance_of(&fixture, fixture.other_account.id), -25.5);
    }

    #[test]
    fn update_fails_on_missing_transaction() {
        let mut fixture = get_fixture();

        let got = fixture
            .ledger
            .update(999, new_expense(&fixture, 1.0, date!(2024 - 01 - 01)));

        assert_eq!(got, Err(Error::NotFound));
    }

    #[test]
    fn delete_reverses_balance_and_removes_row() {
        let mut fixture = get_fixture();
        let transaction = fixture
            .ledger
            .create(new_expense(&fixture, 12.25, date!(2024 - 03 - 03)))
            .unwrap();

        let removed = fixture.ledger.delete(transaction.id).unwrap();

        assert_eq!(removed.id, transaction.id);
        assert_eq!(balance_of(&fixture, fixture.account.id), 0.0);
        assert_eq!(fixture.ledger.get(transaction.id), Err(Error::NotFound));
    }

    #[test]
    fn delete_fails_on_missing_transaction() {
        let mut fixture = get_fixture();

        assert_eq!(fixture.ledger.delete(999), Err(Error::NotFound));
    }

    #[test]
    fn list_by_account_returns_most_recent_first() {
        let mut fixture = get_fixture();
        let first = fixture
            .ledger
            .create(new_expense(&fixture, 1.0, date!(2024 - 03 - 05)))
            .unwrap();
        let second = fixture
            .ledger
            .create(new_expense(&fixture, 2.0, date!(2024 - 03 - 01)))
            .unwrap();
        let third = fixture
            .ledger
            .create(new_expense(&fixture, 3.0, date!(2024 - 03 - 05)))
            .unwrap();

        let got = fixture.ledger.list_by_account(fixture.account.id).unwrap();

        let got_ids: Vec<_> = got.iter().map(|transaction| transaction.id).collect();
        assert_eq!(
            got_ids,
            vec![third.id, first.id, second.id],
            "ties on date must be broken by creation order, newest first"
        );
    }

    #[test]
    fn balance_always_matches_signed_sum() {
        let mut fixture = get_fixture();

        let assert_invariant = |fixture: &Fixture| {
            let want: f64 = fixture
                .ledger
                .list_by_account(fixture.account.id)
                .unwrap()
                .iter()
                .map(Transaction::signed_amount)
                .sum();
            assert_eq!(balance_of(fixture, fixture.account.id), want);
        };

        let expense = fixture
            .ledger
            .create(new_expense(&fixture, 10.25, date!(2024 - 04 - 01)))
            .unwrap();
        assert_invariant(&fixture);

        let income = fixture
            .ledger
            .create(new_income(&fixture, 3.5, date!(2024 - 04 - 02)))
            .unwrap();
        assert_invariant(&fixture);

        fixture
            .ledger
            .update(expense.id, new_expense(&fixture, 7.75, date!(2024 - 04 - 01)))
            .unwrap();
        assert_invariant(&fixture);

        fixture.ledger.delete(income.id).unwrap();
        assert_invariant(&fixture);
    }

    fn new_recurring_expense(
        fixture: &Fixture,
        amount: f64,
        date: Date,
        interval: RecurringInterval,
        next_occurrence_at: Date,
    ) -> NewTransaction {
        NewTransaction {
            recurrence: Some(Recurrence {
                interval,
                next_occurrence_at,
                last_processed_at: None,
            }),
            ..new_expense(fixture, amount, date)
        }
    }

    #[test]
    fn due_recurring_returns_only_due_schedules() {
        let mut fixture = get_fixture();
        let due = fixture
            .ledger
            .create(new_recurring_expense(
                &fixture,
                5.0,
                date!(2024 - 01 - 01),
                RecurringInterval::Monthly,
                date!(2024 - 02 - 01),
            ))
            .unwrap();
        fixture
            .ledger
            .create(new_recurring_expense(
                &fixture,
                5.0,
                date!(2024 - 02 - 10),
                RecurringInterval::Monthly,
                date!(2024 - 03 - 10),
            ))
            .unwrap();
        fixture
            .ledger
            .create(new_expense(&fixture, 5.0, date!(2024 - 01 - 01)))
            .unwrap();

        let got = fixture.ledger.due_recurring(date!(2024 - 02 - 15)).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, due.id);
    }

    #[test]
    fn materialize_creates_copy_and_advances_schedule() {
        let mut fixture = get_fixture();
        let origin = fixture
            .ledger
            .create(new_recurring_expense(
                &fixture,
                19.99,
                date!(2024 - 01 - 31),
                RecurringInterval::Monthly,
                date!(2024 - 02 - 29),
            ))
            .unwrap();
        let now = date!(2024 - 03 - 01);

        let occurrence = fixture
            .ledger
            .materialize_occurrence(origin.id, now)
            .unwrap()
            .expect("an occurrence was due");

        assert_eq!(occurrence.date, date!(2024 - 02 - 29));
        assert_eq!(occurrence.amount, 19.99);
        assert_eq!(occurrence.transaction_type, TransactionType::Expense);
        assert_eq!(occurrence.origin_id, Some(origin.id));
        assert!(!occurrence.is_recurring());

        let advanced = fixture.ledger.get(origin.id).unwrap();
        let recurrence = advanced.recurrence.expect("origin must stay recurring");
        assert_eq!(recurrence.next_occurrence_at, date!(2024 - 03 - 29));
        assert_eq!(recurrence.last_processed_at, Some(now));

        // Origin and its copy both count against the balance.
        assert_eq!(balance_of(&fixture, fixture.account.id), -39.98);
    }

    #[test]
    fn materialize_returns_none_when_not_due() {
        let mut fixture = get_fixture();
        let origin = fixture
            .ledger
            .create(new_recurring_expense(
                &fixture,
                5.0,
                date!(2024 - 01 - 01),
                RecurringInterval::Weekly,
                date!(2024 - 01 - 08),
            ))
            .unwrap();

        let got = fixture
            .ledger
            .materialize_occurrence(origin.id, date!(2024 - 01 - 07))
            .unwrap();

        assert_eq!(got, None);
        let unchanged = fixture.ledger.get(origin.id).unwrap();
        assert_eq!(
            unchanged.recurrence.unwrap().next_occurrence_at,
            date!(2024 - 01 - 08)
        );
    }

    #[test]
    fn materialize_skips_already_booked_due_date() {
        let mut fixture = get_fixture();
        let origin = fixture
            .ledger
            .create(new_recurring_expense(
                &fixture,
                5.0,
                date!(2024 - 01 - 31),
                RecurringInterval::Monthly,
                date!(2024 - 02 - 29),
            ))
            .unwrap();
        fixture
            .ledger
            .create(NewTransaction {
                origin_id: Some(origin.id),
                ..new_expense(&fixture, 5.0, date!(2024 - 02 - 29))
            })
            .unwrap();
        let balance_before = balance_of(&fixture, fixture.account.id);

        let got = fixture
            .ledger
            .materialize_occurrence(origin.id, date!(2024 - 03 - 01))
            .unwrap();

        assert_eq!(got, None, "the due date was already booked");
        assert_eq!(balance_of(&fixture, fixture.account.id), balance_before);
        // The schedule must still advance so the origin does not wedge.
        let advanced = fixture.ledger.get(origin.id).unwrap();
        assert_eq!(
            advanced.recurrence.unwrap().next_occurrence_at,
            date!(2024 - 03 - 29)
        );
    }

    #[test]
    fn reconcile_balances_reports_and_repairs_drift() {
        let mut fixture = get_fixture();
        fixture
            .ledger
            .create(new_expense(&fixture, 19.99, date!(2024 - 01 - 31)))
            .unwrap();

        // Corrupt the cached balance behind the store's back.
        fixture
            .connection
            .lock()
            .unwrap()
            .execute(
                "UPDATE account SET balance = 100.0 WHERE id = ?1",
                [fixture.account.id],
            )
            .unwrap();

        let drifts = fixture.ledger.reconcile_balances(false).unwrap();
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].account_id, fixture.account.id);
        assert_eq!(drifts[0].cached, 100.0);
        assert_eq!(drifts[0].computed, -19.99);
        assert_eq!(
            balance_of(&fixture, fixture.account.id),
            100.0,
            "an audit without repair must not write"
        );

        fixture.ledger.reconcile_balances(true).unwrap();
        assert_eq!(balance_of(&fixture, fixture.account.id), -19.99);
        assert_eq!(fixture.ledger.reconcile_balances(false).unwrap(), vec![]);
    }
}
