// lib/src/notifications/templates.rs
use models::billing::{Payment, SubscriptionPlan};
use models::medical::{Appointment, User};

use super::EmailMessage;

const TIME_FORMAT: &str = "%A %d %B %Y, %H:%M UTC";

pub fn welcome(user: &User, hospital_name: Option<&str>) -> EmailMessage {
    let place = hospital_name.map(|name| format!(" at {}", name)).unwrap_or_default();
    EmailMessage {
        to: user.email.clone(),
        subject: "Welcome to Medcor".into(),
        body: format!(
            "Hello {},\n\nYour {} account{} is ready. Sign in with the username '{}'.\n",
            user.full_name(),
            user.role,
            place,
            user.username
        ),
    }
}

pub fn appointment_booked(patient: &User, doctor: &User, appointment: &Appointment) -> EmailMessage {
    EmailMessage {
        to: patient.email.clone(),
        subject: "Appointment request received".into(),
        body: format!(
            "Hello {},\n\nYour appointment with Dr. {} on {} has been requested and is awaiting confirmation.\nReference: {}\n",
            patient.full_name(),
            doctor.last,
            appointment.scheduled_start.format(TIME_FORMAT),
            appointment.id
        ),
    }
}

pub fn appointment_status_changed(patient: &User, appointment: &Appointment) -> EmailMessage {
    let mut body = format!(
        "Hello {},\n\nYour appointment on {} is now {}.\n",
        patient.full_name(),
        appointment.scheduled_start.format(TIME_FORMAT),
        appointment.status
    );
    if let Some(reason) = &appointment.cancellation_reason {
        body.push_str(&format!("Reason: {}\n", reason));
    }
    EmailMessage { to: patient.email.clone(), subject: format!("Appointment {}", appointment.status), body }
}

pub fn payment_receipt(to: &str, plan: &SubscriptionPlan, payment: &Payment) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Payment receipt for {}", plan.name),
        body: format!(
            "We received {}.{:02} {} for the {} plan.\nPayment reference: {}\n",
            payment.amount_cents / 100,
            payment.amount_cents % 100,
            payment.currency,
            plan.name,
            payment.reference.as_deref().unwrap_or("n/a")
        ),
    }
}
