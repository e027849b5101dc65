use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::students::{class_not_found, student_not_found, validate_student_id};
use super::{normalize_class_name, School};
use crate::documents::{
    fee_overflow, ClassFees, FeeStructure, Invoice, InvoiceLedger, Roster, StudentRecord,
};
use crate::store::Connector;
use crate::{Result, SchoolError};

/// The outcome of collecting a payment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeCollection {
    /// the student's record after the payment
    pub student: StudentRecord,
    /// the invoice issued for the payment, when one was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
}

impl<C: Connector> School<C> {
    /// the whole fee structure document
    pub fn get_fee_structure(&self) -> Result<FeeStructure> {
        self.store.read(&self.fees_path())
    }

    /// the fee breakdown of one class
    ///
    /// # Errors
    /// `SchoolError::NotFound` if the class has no fee entry
    pub fn get_class_fees(&self, class_name: &str) -> Result<ClassFees> {
        let class = normalize_class_name(class_name)?;
        self.get_fee_structure()?
            .class_fees
            .get(&class)
            .copied()
            .ok_or_else(|| fees_not_found(&class))
    }

    /// inserts or replaces the fee breakdown of one class, computing its total
    ///
    /// # Errors
    /// `SchoolError::BadRequest` if a component is negative or the total is not positive
    pub fn set_fee_structure(
        &self,
        class_name: &str,
        tuition_fees: i64,
        lab_fees: i64,
        miscellaneous_fees: i64,
    ) -> Result<ClassFees> {
        let class = normalize_class_name(class_name)?;
        if tuition_fees < 0 || lab_fees < 0 || miscellaneous_fees < 0 {
            return Err(SchoolError::BadRequest(
                "Fee components cannot be negative".to_string(),
            ));
        }
        let fees = ClassFees::new(tuition_fees, lab_fees, miscellaneous_fees)?;
        if fees.total_fees <= 0 {
            return Err(SchoolError::BadRequest(
                "Total fees must be greater than zero".to_string(),
            ));
        }

        self.store
            .mutate(&self.fees_path(), |doc: &mut FeeStructure| {
                doc.class_fees.insert(class.clone(), fees);
                Ok(())
            })?;
        info!(class = %class, total = fees.total_fees, "fee structure set");
        Ok(fees)
    }

    /// removes the fee breakdown of one class
    ///
    /// # Errors
    /// `SchoolError::NotFound` if the class has no fee entry
    pub fn delete_fee_structure(&self, class_name: &str) -> Result<ClassFees> {
        let class = normalize_class_name(class_name)?;
        self.store
            .mutate(&self.fees_path(), |doc: &mut FeeStructure| {
                doc.class_fees
                    .remove(&class)
                    .ok_or_else(|| fees_not_found(&class))
            })
    }

    /// adds `amount` to the student's `feespaid` and recomputes `feesremaining`.
    ///
    /// With `generate_invoice` the next invoice number is allocated from the ledger, a receipt is
    /// rendered and the invoice is appended to the ledger. The roster is written before the
    /// ledger; the two documents are not updated atomically.
    ///
    /// # Errors
    /// `SchoolError::BadRequest` for a negative amount, `SchoolError::NotFound` if the class or
    /// the student does not exist
    pub fn collect_fee(
        &self,
        class_name: &str,
        student_id: &str,
        amount: i64,
        generate_invoice: bool,
    ) -> Result<FeeCollection> {
        if amount < 0 {
            return Err(SchoolError::BadRequest("Amount cannot be negative".to_string()));
        }
        let class = normalize_class_name(class_name)?;
        let student_id = validate_student_id(student_id)?;

        let student = self.store.mutate_existing(
            &self.roster_path(&class),
            || class_not_found(&class),
            |roster: &mut Roster| {
                let record = roster
                    .get_mut(student_id)
                    .ok_or_else(|| student_not_found(&class, student_id))?;
                record.feespaid = record
                    .feespaid
                    .checked_add(amount)
                    .ok_or_else(|| fee_overflow("feespaid"))?;
                record.recompute_remaining()?;
                Ok(record.clone())
            },
        )?;
        info!(class = %class, student = %student_id, amount, "fee collected");

        let invoice = if generate_invoice {
            Some(self.issue_invoice(&class, student_id, amount, &student)?)
        } else {
            None
        };

        Ok(FeeCollection { student, invoice })
    }

    /// allocates the next invoice number, renders the receipt and appends the invoice
    fn issue_invoice(
        &self,
        class: &str,
        student_id: &str,
        amount: i64,
        student: &StudentRecord,
    ) -> Result<Invoice> {
        let student_name = student.info.get("name").and_then(|v| v.as_str());
        let mut rendered: Option<PathBuf> = None;

        let issued = self
            .store
            .mutate(&self.invoices_path(), |ledger: &mut InvoiceLedger| {
                let mut invoice = Invoice {
                    invoice_number: ledger.next_invoice_number,
                    class_name: class.to_string(),
                    student_id: student_id.to_string(),
                    amount,
                    feespaid: student.feespaid,
                    feesremaining: student.feesremaining,
                    issued_at: Utc::now(),
                    receipt: None,
                };
                match self.receipts.render(&invoice, student_name) {
                    Ok(path) => {
                        invoice.receipt = Some(path.to_string_lossy().to_string());
                        rendered = Some(path);
                    }
                    Err(e) => warn!(
                        invoice = invoice.invoice_number,
                        "receipt could not be rendered: {}", e
                    ),
                }
                ledger.next_invoice_number += 1;
                ledger.invoices.push(invoice.clone());
                Ok(invoice)
            });

        match issued {
            Ok(invoice) => {
                info!(invoice = invoice.invoice_number, "invoice issued");
                Ok(invoice)
            }
            Err(e) => {
                // the ledger was not written, so the receipt refers to no invoice
                if let Some(path) = rendered {
                    if let Err(rm) = fs::remove_file(&path) {
                        warn!("could not remove orphaned receipt {:?}: {}", path, rm);
                    }
                }
                Err(e)
            }
        }
    }

    /// the invoice ledger
    pub fn list_invoices(&self) -> Result<InvoiceLedger> {
        self.store.read(&self.invoices_path())
    }

    /// one invoice by number
    ///
    /// # Errors
    /// `SchoolError::NotFound` if no invoice has that number
    pub fn get_invoice(&self, invoice_number: u64) -> Result<Invoice> {
        self.list_invoices()?
            .invoices
            .into_iter()
            .find(|i| i.invoice_number == invoice_number)
            .ok_or_else(|| {
                SchoolError::NotFound(format!("Invoice {} not found", invoice_number))
            })
    }
}

fn fees_not_found(class: &str) -> SchoolError {
    SchoolError::NotFound(format!("No fee structure for class '{}'", class))
}
