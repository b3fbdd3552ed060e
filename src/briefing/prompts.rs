//! Interviewer system prompt, extraction prompt, and the scripted texts
//! shown when the LLM is unavailable.

use serde_json::{Value, json};

/// Opening turn used when the LLM fails to start the conversation.
pub const FALLBACK_GREETING: &str = "Olá! Sou o assistente virtual da ASCOM do TRE-MT. \
Estou aqui para ajudar a divulgar as ações do seu cartório ou setor. \
Sobre qual evento ou atividade você gostaria de falar hoje?";

/// Interviewer turn used when a conversational reply fails.
pub const FALLBACK_APOLOGY: &str =
    "Desculpe, tive um problema ao processar sua resposta. Pode tentar novamente?";

/// Respondent-side message that asks the model to open the interview.
pub const KICKOFF_MESSAGE: &str = "Olá, vamos iniciar a entrevista.";

/// System instruction for the interviewing model.
pub const INTERVIEWER_SYSTEM_PROMPT: &str = "\
Você é um jornalista assessor de imprensa experiente do Tribunal Regional Eleitoral de Mato Grosso (TRE-MT).
Você entrevista servidores para reunir dados para matérias do site institucional.

ETAPA 1: IDENTIFICAÇÃO (comece sempre por aqui)
Antes de falar do evento ou da ação, colete os dados de quem está passando as informações:
1. Nome completo do servidor.
2. Cargo ou função.
3. Telefone de contato para dúvidas da redação.

ETAPA 2: O FATO (5W2H)
Depois da identificação, apure o evento ou a ação. Conduza a conversa de forma fluida até cobrir:
1. O que? (ação ou evento)
2. Quem? (responsáveis, organizadores)
3. Como? (formato, metodologia)
4. Quando? (datas e horários)
5. Por que? (motivação)
6. Para quem? (público-alvo)
7. Quais os objetivos esperados?
8. Quais os riscos se a ação não for executada?

ETAPA 3: ASPAS (encerramento)
Só depois de apurar o fato, pergunte se desejam incluir uma declaração (aspas) na matéria.
- Se sim: pergunte nome e cargo de quem dará a declaração.
- Se não: agradeça e encerre a entrevista.

REGRAS
- Seja cordial e profissional.
- Faça uma pergunta por vez.
- Não aceite respostas vagas; peça detalhes com gentileza.
- Seu papel é reunir insumos para a redação, não escrever a matéria.

Exemplo de abertura: \"Olá! Sou o assistente da ASCOM. Para começarmos, poderia me informar seu nome completo, cargo e um telefone de contato?\"";

/// System instruction for the extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "Você é um assistente de extração de dados. Responda somente com JSON válido.";

/// Build the extraction prompt around a linearized transcript.
pub fn extraction_prompt(transcript_text: &str) -> String {
    format!(
        "Analise a transcrição a seguir, uma entrevista entre o assessor da ASCOM (INTERVIEWER) \
         e o servidor (RESPONDENT), e extraia as informações estruturadas.\n\n\
         No campo 'sugestao_materia', atue como redator final: escreva a notícia completa \
         (título, linha fina e texto) com base no que foi apurado, em tom formal e institucional. \
         Se faltarem informações de serviço (documentos necessários, locais de atendimento), \
         complemente com o conhecimento geral sobre a Justiça Eleitoral.\n\n\
         --- TRANSCRIÇÃO ---\n\
         {transcript_text}\n\
         -------------------\n\n\
         Responda somente com o objeto JSON, sem explicações nem markdown."
    )
}

fn field(description: &str) -> Value {
    json!({ "type": "STRING", "description": description })
}

/// Response schema for the extraction call.
///
/// The model is also required to fill `sugestao_materia`; the local
/// validity check only covers `BriefingRecord::REQUIRED_FIELDS`.
pub fn record_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "servidor_nome": field("Nome do servidor entrevistado."),
            "servidor_cargo": field("Cargo do servidor entrevistado."),
            "servidor_telefone": field("Telefone de contato do servidor."),
            "aspas_sim_nao": field("Se deseja aspas na matéria (Sim/Não)."),
            "aspas_quem_fala": field("Nome e cargo de quem dará a declaração, se houver aspas."),
            "o_que": field("O fato principal, evento ou ação."),
            "quem": field("Quem realiza, organiza ou participa."),
            "como": field("Como será realizado: formato e detalhes logísticos."),
            "quando": field("Datas, horários e duração."),
            "por_que": field("A razão ou justificativa da ação."),
            "para_quem": field("Público-alvo ou beneficiários."),
            "objetivos_esperados": field("Resultados que se espera alcançar."),
            "riscos_nao_execucao": field("Consequências negativas caso a ação não ocorra."),
            "observacoes_adicionais": field("Outros detalhes relevantes mencionados."),
            "sugestao_materia": field(
                "Matéria jornalística completa, pronta para o site do TRE-MT: título, linha fina e texto."
            ),
        },
        "required": ["servidor_nome", "o_que", "quem", "quando", "como", "sugestao_materia"],
    })
}

/// Pull a JSON object out of a model reply that may wrap it in prose or
/// a markdown code fence.
pub fn extract_json_object(text: &str) -> &str {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed;
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner;
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return &trimmed[start..=end];
    }

    trimmed
}
