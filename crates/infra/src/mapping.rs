//! Entity <-> record mapping. The only place the codec touches entity data.

use talentverify_core::SensitiveValue;
use talentverify_crypto::{CodecError, FieldCodec};
use talentverify_directory::{Company, Employee};

use crate::records::{CompanyRecord, EmployeeRecord};

fn seal_optional(codec: &FieldCodec, value: Option<&SensitiveValue>) -> Result<Option<String>, CodecError> {
    value.map(|v| codec.encode_value(v)).transpose()
}

pub fn seal_company(codec: &FieldCodec, company: &Company) -> Result<CompanyRecord, CodecError> {
    Ok(CompanyRecord {
        id: company.id,
        name: company.name.clone(),
        registration_number: codec.encode_value(&company.registration_number)?,
        registration_date: company.registration_date,
        address: company.address.clone(),
        employee_count: company.employee_count,
        contact_person: company.contact_person.clone(),
        contact_phone: seal_optional(codec, company.contact_phone.as_ref())?,
        email: seal_optional(codec, company.email.as_ref())?,
        created_at: company.created_at,
        updated_at: company.updated_at,
    })
}

pub fn open_company(codec: &FieldCodec, record: CompanyRecord) -> Result<Company, CodecError> {
    Ok(Company {
        id: record.id,
        name: record.name,
        registration_number: codec.open(&record.registration_number)?,
        registration_date: record.registration_date,
        address: record.address,
        employee_count: record.employee_count,
        contact_person: record.contact_person,
        contact_phone: codec.decode(record.contact_phone.as_deref())?,
        email: codec.decode(record.email.as_deref())?,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

pub fn seal_employee(codec: &FieldCodec, employee: &Employee) -> Result<EmployeeRecord, CodecError> {
    Ok(EmployeeRecord {
        id: employee.id,
        name: employee.name.clone(),
        employee_code: seal_optional(codec, employee.employee_code.as_ref())?,
        company_id: employee.company_id,
        department_id: employee.department_id,
        current_role: employee.current_role.clone(),
        join_date: employee.join_date,
        leave_date: employee.leave_date,
        is_active: employee.is_active,
        created_at: employee.created_at,
        updated_at: employee.updated_at,
    })
}

pub fn open_employee(codec: &FieldCodec, record: EmployeeRecord) -> Result<Employee, CodecError> {
    Ok(Employee {
        id: record.id,
        name: record.name,
        employee_code: codec.decode(record.employee_code.as_deref())?,
        company_id: record.company_id,
        department_id: record.department_id,
        current_role: record.current_role,
        join_date: record.join_date,
        leave_date: record.leave_date,
        is_active: record.is_active,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use talentverify_directory::CompanyDraft;

    fn company() -> Company {
        Company::register(
            CompanyDraft {
                name: "Acme Ltd".to_string(),
                registration_number: "REG1".to_string(),
                registration_date: NaiveDate::from_ymd_opt(2018, 7, 1).unwrap(),
                address: "1 Main St".to_string(),
                employee_count: 0,
                contact_person: "Jane".to_string(),
                contact_phone: Some("+263 77 000 0000".to_string()),
                email: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn records_never_hold_plaintext() {
        let codec = FieldCodec::from_key([9u8; 32]);
        let record = seal_company(&codec, &company()).unwrap();
        assert_ne!(record.registration_number, "REG1");
        assert!(!record.contact_phone.as_deref().unwrap_or("").contains("263"));
        assert_eq!(record.email, None);

        let opened = open_company(&codec, record).unwrap();
        assert_eq!(opened.registration_key(), Some("REG1"));
    }

    #[test]
    fn corrupt_tokens_survive_a_resave() {
        let codec = FieldCodec::from_key([9u8; 32]);
        let mut record = seal_company(&codec, &company()).unwrap();
        record.contact_phone = Some("garbage".to_string());

        let opened = open_company(&codec, record).unwrap();
        assert!(opened.contact_phone.as_ref().unwrap().is_undecryptable());

        let resealed = seal_company(&codec, &opened).unwrap();
        assert_eq!(resealed.contact_phone.as_deref(), Some("garbage"));
    }
}
