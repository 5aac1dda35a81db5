use std::collections::HashMap;

use crate::record::NormalizedRow;

/// Consolidated contact details for one customer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contact {
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
}

/// One customer as it will be written to the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerRecord {
    pub name: String,
    pub contact: Contact,
}

/// Collapses rows into one contact record per distinct customer name
///
/// Names match exactly. For each contact field the last non-empty value
/// in row order wins, treating the file as time-ordered so a later
/// correction overrides earlier entries. A customer with no contact info
/// anywhere keeps empty fields. First-seen order is preserved so the
/// customer ids assigned by the store come out deterministic.
pub fn consolidate<'a, I>(rows: I) -> Vec<CustomerRecord>
where
    I: IntoIterator<Item = &'a NormalizedRow>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut customers: Vec<CustomerRecord> = Vec::new();

    for row in rows {
        let i = *index.entry(row.customer_name.clone()).or_insert_with(|| {
            customers.push(CustomerRecord {
                name: row.customer_name.clone(),
                contact: Contact::default(),
            });
            customers.len() - 1
        });

        let contact = &mut customers[i].contact;
        if row.contact_name.is_some() {
            contact.contact_name = row.contact_name.clone();
        }
        if row.contact_phone.is_some() {
            contact.contact_phone = row.contact_phone.clone();
        }
        if row.contact_email.is_some() {
            contact.contact_email = row.contact_email.clone();
        }
    }

    customers
}
