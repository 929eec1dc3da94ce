//! User-facing reply texts (Portuguese, WhatsApp markup).

use crate::gateway::GatewayError;
use crate::models::{AppointmentRecord, Draft};
use crate::schedule;
use chrono::NaiveDateTime;

pub fn menu(studio_name: &str) -> String {
    format!(
        "🌸 *Seja bem-vinda ao {}* 🌸\n\n\
         Escolha uma opção:\n\
         1️⃣ *Agendamento*\n\
         2️⃣ *Agendamento com atendente*\n\
         3️⃣ *Ver minha agenda*\n\
         4️⃣ *Manicure e Pedicure*\n\n\
         Responda com o número (ex: 1) ou com a palavra.",
        studio_name
    )
}

pub fn invalid_option() -> String {
    "Opção inválida. Digite *menu* para ver novamente.".to_string()
}

pub fn human_agent() -> String {
    "💁 Aguarde só um instante, uma atendente irá te responder em breve. Obrigada!".to_string()
}

pub fn service_menu<'a>(services: impl Iterator<Item = &'a str>) -> String {
    let list: Vec<String> = services.map(|s| format!("- {}", s)).collect();
    format!(
        "✨ *Agendamento* ✨\n\nServiços disponíveis:\n{}\n\nDigite o nome do serviço que deseja (ex: Corte).",
        list.join("\n")
    )
}

pub fn unknown_service<'a>(services: impl Iterator<Item = &'a str>) -> String {
    let list: Vec<&str> = services.collect();
    format!(
        "Serviço não reconhecido. Serviços disponíveis:\n{}\nPor favor digite exatamente um destes nomes.",
        list.join(", ")
    )
}

pub fn ask_color_current() -> String {
    "Qual a cor atual do cabelo?".to_string()
}

pub fn ask_color_desired() -> String {
    "Qual a cor desejada?".to_string()
}

pub fn ask_date_time() -> String {
    "Ótimo. Agora informe a data e horário no formato dd/mm/aa hh:mm (ex: 02/10/25 14:00).".to_string()
}

pub fn ask_date_time_after_colors() -> String {
    "Perfeito. Agora informe a data e horário no formato dd/mm/aa hh:mm (ex: 02/10/25 14:00).".to_string()
}

pub fn manicure_date_time() -> String {
    "💅 *Manicure e Pedicure* 💅\n\nPor favor, escolha a data e horário (dd/mm/aa hh:mm). \
     Lembre: não atendemos domingos, nem 12:00-13:30."
        .to_string()
}

pub fn manicure_day() -> String {
    "💅 *Manicure e Pedicure* 💅\n\nPor favor, escolha a data (dd/mm/aa). \
     Em seguida mostramos os horários disponíveis nesse dia."
        .to_string()
}

pub fn invalid_date_time() -> String {
    "Formato inválido. Envie a data no formato dd/mm/aa hh:mm (ex: 02/10/25 14:00).".to_string()
}

pub fn invalid_day() -> String {
    "Formato inválido. Envie a data no formato dd/mm/aa (ex: 02/10/25).".to_string()
}

pub fn invalid_hour(slots: &[String]) -> String {
    format!(
        "Horário não disponível. Escolha um destes horários:\n{}",
        slots.join(", ")
    )
}

pub fn confirmation_summary(phone: &str, draft: &Draft, date_time: &NaiveDateTime) -> String {
    let mut lines = vec![
        "Confirme seu agendamento:".to_string(),
        format!("Telefone: {}", phone),
        format!("Serviço: {}", draft.service),
        format!("Data/Hora: {}", schedule::display(date_time)),
    ];
    if let Some(color) = &draft.color {
        lines.push(format!("Cor atual: {}", color.current));
        lines.push(format!("Cor desejada: {}", color.desired));
    }
    lines.push("\nResponda *SIM* para confirmar ou *NÃO* para cancelar.".to_string());
    lines.join("\n")
}

pub fn cancelled() -> String {
    "Ok, sem problemas. Agendamento cancelado. Digite *menu* para voltar ao menu.".to_string()
}

pub fn fallback() -> String {
    "Digite *menu* para começar.".to_string()
}

pub fn booking_confirmed(record_id: &str) -> String {
    format!(
        "✅ Agendamento confirmado! Código: {}\nAgradecemos sua preferência. Se precisar alterar, responda *menu*.",
        record_id
    )
}

pub fn booking_failed(err: &GatewayError) -> String {
    format!("Desculpe, não consegui salvar o agendamento: {}", err)
}

pub fn bookings(records: &[AppointmentRecord]) -> String {
    if records.is_empty() {
        return "📅 Você não tem agendamentos no nosso sistema.".to_string();
    }
    let mut lines = vec!["📅 Seus agendamentos:".to_string()];
    for r in records {
        lines.push(format!(
            "- {} | {} | {}",
            or_placeholder(&r.date_time, "sem data"),
            or_placeholder(&r.service, "—"),
            or_placeholder(&r.status, "—"),
        ));
    }
    lines.join("\n")
}

pub fn bookings_failed(err: &GatewayError) -> String {
    match err {
        GatewayError::NotConfigured => {
            "O sistema de agendamentos não está configurado no servidor. Não consigo mostrar sua agenda agora."
                .to_string()
        }
        other => format!("Erro ao buscar agenda: {}", other),
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}
